//! Basic Analysis Example
//!
//! Parses a small Search Console export, trains a regression model and
//! prints the quadrant report.

use serplens::data::Dataset;
use serplens::quadrant;
use serplens::training::{train_with_metrics, ModelKind};

const EXPORT: &str = "\
Top queries,Clicks,Impressions,CTR,Position
rust csv parser,120,1500,8%,3.2
rust dataframe,80,2000,4%,5.1
polars tutorial,200,1800,11.1%,2.4
ndarray examples,15,900,1.7%,12.8
axum multipart upload,45,700,6.4%,6.0
tokio graceful shutdown,30,1200,2.5%,9.3
serde json tutorial,300,2600,11.5%,1.9
thiserror vs anyhow,25,1100,2.3%,10.6
criterion benchmark guide,60,800,7.5%,4.4
reqwest post json,90,1700,5.3%,5.8
";

fn main() -> anyhow::Result<()> {
    let dataset = Dataset::from_csv_bytes(EXPORT.as_bytes())?;
    println!(
        "Dataset: {} rows, {} columns",
        dataset.len(),
        dataset.column_names().len()
    );

    // Train on the seeded 80/20 split
    let kind = ModelKind::LinearRegression;
    let (model, metrics) = train_with_metrics(&dataset, kind)?;
    println!("\nMean Squared Error for {}: {:.2}", kind, metrics.mse);
    println!("  RMSE: {:.2}", metrics.rmse);
    println!("  R²:   {:.4}", metrics.r2);

    // Score every row and bucket them by performance
    let predictions = model.predict(&dataset.feature_matrix()?)?;
    let scored = dataset.with_predicted_clicks(&predictions)?;
    let report = quadrant::classify(&scored)?;

    println!(
        "\nQuadrants (mean CTR {:.4}, mean position {:.2}):",
        report.mean_ctr, report.mean_position
    );
    for bucket in &report.buckets {
        println!("\n{} — {} queries", bucket.quadrant, bucket.rows.len());
        println!("  {}", bucket.commentary);
        for row in &bucket.rows {
            println!(
                "    {} (ctr {:.3}, position {:.1}, predicted clicks {:.2})",
                row.query,
                row.ctr,
                row.position,
                row.predicted_clicks.unwrap_or_default()
            );
        }
    }

    Ok(())
}
