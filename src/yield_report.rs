//! Yield summary and the printable report document.
//!
//! Aggregates every harvest report into container totals and per-parcel box
//! counts, then renders the HTML document the platform's print service turns
//! into a PDF. Only the markup is built here; rasterization is the
//! frontend's printer plugin.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::api::RemoteStore;
use crate::reports::{self, HarvestReport};

/// Totals across all reports, by container type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YieldTotals {
    pub export_6oz: u64,
    pub export_12oz: u64,
    pub process_trays: u64,
}

/// Export boxes attributed to one parcel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParcelYield {
    pub parcel_name: String,
    pub total_boxes: u64,
}

/// Aggregated dashboard/report data.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YieldSummary {
    pub totals: YieldTotals,
    pub by_parcel: Vec<ParcelYield>,
    pub report_count: usize,
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Fold the report list into totals and per-parcel box counts. Parcels are
/// sorted by box count, biggest producer first.
pub fn summarize(reports: &[HarvestReport]) -> YieldSummary {
    let mut totals = YieldTotals::default();
    let mut by_parcel: Vec<ParcelYield> = Vec::new();

    for report in reports {
        totals.export_6oz += u64::from(report.export_6oz);
        totals.export_12oz += u64::from(report.export_12oz);
        totals.process_trays += u64::from(report.process_tray_count);

        let name = if report.parcel_name.trim().is_empty() {
            "Unknown parcel"
        } else {
            report.parcel_name.as_str()
        };
        let boxes = u64::from(report.export_6oz) + u64::from(report.export_12oz);
        match by_parcel.iter_mut().find(|p| p.parcel_name == name) {
            Some(entry) => entry.total_boxes += boxes,
            None => by_parcel.push(ParcelYield {
                parcel_name: name.to_string(),
                total_boxes: boxes,
            }),
        }
    }

    by_parcel.sort_by(|a, b| {
        b.total_boxes
            .cmp(&a.total_boxes)
            .then_with(|| a.parcel_name.cmp(&b.parcel_name))
    });

    YieldSummary {
        totals,
        by_parcel,
        report_count: reports.len(),
    }
}

// ---------------------------------------------------------------------------
// HTML document
// ---------------------------------------------------------------------------

fn html_escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn report_row(report: &HarvestReport) -> String {
    let date = report
        .created_at
        .split('T')
        .next()
        .unwrap_or(&report.created_at);
    let photo_cell = if report.photo_url.is_empty() {
        "No photo".to_string()
    } else {
        format!(
            "<img src=\"{}\" style=\"width: 50px; height: 50px; border-radius: 5px;\" />",
            html_escape(&report.photo_url)
        )
    };

    format!(
        "<tr>\
         <td>{}</td>\
         <td>{}</td>\
         <td>{}</td>\
         <td style=\"text-align: center\">{}</td>\
         <td style=\"text-align: center\">{}</td>\
         <td style=\"text-align: center\">{}</td>\
         <td style=\"text-align: center\">{}</td>\
         </tr>",
        html_escape(date),
        html_escape(&report.parcel_name),
        html_escape(&report.material_name),
        report.export_6oz,
        report.export_12oz,
        report.process_tray_count,
        photo_cell,
    )
}

/// Build the complete report document. `generated_on` is the date line under
/// the title.
pub fn build_report_html(
    reports: &[HarvestReport],
    summary: &YieldSummary,
    generated_on: &str,
) -> String {
    let rows: String = reports.iter().map(report_row).collect();

    format!(
        r#"<html>
  <head>
    <meta name="viewport" content="width=device-width, initial-scale=1.0" />
    <style>
      body {{ font-family: 'Helvetica', sans-serif; padding: 20px; }}
      h1 {{ color: #B0161E; text-align: center; }}
      table {{ width: 100%; border-collapse: collapse; margin-top: 20px; font-size: 12px; }}
      th, td {{ border: 1px solid #ddd; padding: 8px; text-align: left; }}
      th {{ background-color: #f2f2f2; color: #333; }}
      .summary {{ margin-bottom: 20px; border: 1px solid #B0161E; padding: 10px; border-radius: 8px; }}
    </style>
  </head>
  <body>
    <h1>Harvest Report</h1>
    <p>Generated on: {generated}</p>

    <div class="summary">
      <h3>Season Totals</h3>
      <p><strong>Export 6oz:</strong> {e6}</p>
      <p><strong>Export 12oz:</strong> {e12}</p>
      <p><strong>Process trays:</strong> {trays}</p>
    </div>

    <table>
      <thead>
        <tr>
          <th>Date</th>
          <th>Parcel</th>
          <th>Material</th>
          <th>6oz</th>
          <th>12oz</th>
          <th>Trays</th>
          <th>Evidence</th>
        </tr>
      </thead>
      <tbody>
        {rows}
      </tbody>
    </table>
  </body>
</html>
"#,
        generated = html_escape(generated_on),
        e6 = summary.totals.export_6oz,
        e12 = summary.totals.export_12oz,
        trays = summary.totals.process_trays,
        rows = rows,
    )
}

/// Fetch every report, build the document, and write it under the app data
/// dir. Returns the file path for the frontend to hand to the print service.
pub async fn export_html<R: RemoteStore>(store: &R, out_dir: &Path) -> Result<PathBuf, String> {
    let reports = reports::fetch_all(store).await?;
    let summary = summarize(&reports);

    let now = chrono::Utc::now();
    let html = build_report_html(&reports, &summary, &now.format("%Y-%m-%d").to_string());

    std::fs::create_dir_all(out_dir).map_err(|e| format!("create export dir: {e}"))?;
    let path = out_dir.join(format!(
        "harvest-report-{}.html",
        now.format("%Y%m%d-%H%M%S")
    ));
    std::fs::write(&path, html).map_err(|e| format!("write report: {e}"))?;

    info!(path = %path.display(), reports = reports.len(), "yield report exported");
    Ok(path)
}

// ===========================================================================
// Tests
// ===========================================================================
