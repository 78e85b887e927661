//! PER Reversion - weekly valuation screener
//!
//! Scores securities by historical PER reversion toward the trailing median.

use anyhow::Result;

use per_reversion::adapters::cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (VALUATION_DB_PATH may live here)
    dotenvy::dotenv().ok();

    let app = cli::init();
    cli::execute(app).await
}
