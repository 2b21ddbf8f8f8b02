//! Excel Mapper API Server binary
//!
//! Hosts the template/source upload, mapping preview and download endpoints.

use clap::Parser;
use excel_mapper::api::{run_api_server, ApiConfig};

#[derive(Parser, Debug)]
#[command(name = "excel-mapper-server")]
#[command(version)]
#[command(about = "Excel Mapper API Server - map source spreadsheet columns onto a template")]
#[command(long_about = r#"
Excel Mapper API Server

Endpoints:
  - POST /excel/upload-template       - Upload a template workbook (multipart field "file")
  - POST /excel/upload-source         - Upload a source workbook (multipart field "file")
  - GET  /excel/templates             - List uploaded templates
  - GET  /excel/sources               - List uploaded source files
  - POST /excel/process-mapping       - Preview the first 5 mapped template rows
  - GET  /excel/download/:templateId  - Download the mapped template (mapped_data.xlsx)

Additional endpoints:
  - GET  /health                      - Health check
  - GET  /version                     - Server version info
  - GET  /                            - API documentation

Uploaded files are held in memory for the lifetime of the process.

Example usage:
  excel-mapper-server                           # Start on localhost:8080
  excel-mapper-server --host 0.0.0.0 --port 3000

  curl -F file=@template.xlsx http://localhost:8080/excel/upload-template
"#)]
struct Args {
    /// Host address to bind to (use 0.0.0.0 for all interfaces)
    #[arg(short = 'H', long, default_value = "127.0.0.1", env = "MAPPER_HOST")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8080", env = "MAPPER_PORT")]
    port: u16,

    /// Largest accepted upload, in megabytes
    #[arg(long, default_value = "25", env = "MAPPER_MAX_UPLOAD_MB")]
    max_upload_mb: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = ApiConfig {
        host: args.host,
        port: args.port,
        max_upload_bytes: args.max_upload_mb * 1024 * 1024,
    };

    run_api_server(config).await
}
