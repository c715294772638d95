use argh::FromArgs;
use std::path::PathBuf;

// defaults for the client
const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 7860;

#[derive(FromArgs)]
/// Medscan client for uploading images and checking the server
struct ClientArgs {
    /// the host to connect to
    #[argh(option, short = 'h', default = "DEFAULT_HOST.to_string()")]
    host: String,

    /// the port to connect to
    #[argh(option, short = 'p', default = "DEFAULT_PORT")]
    port: u16,

    /// command to execute: "analyze" or "status"
    #[argh(subcommand)]
    command: ClientCommands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum ClientCommands {
    Analyze(AnalyzeCommand),
    Status(StatusCommand),
}

#[derive(FromArgs)]
/// Upload an image and print the analysis
#[argh(subcommand, name = "analyze")]
struct AnalyzeCommand {
    /// the path to the image
    #[argh(option, short = 'i')]
    image_path: PathBuf,
}

#[derive(FromArgs)]
/// Check whether the server is busy
#[argh(subcommand, name = "status")]
struct StatusCommand {}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: ClientArgs = argh::from_env();

    let client = reqwest::Client::new();

    // format the host and port
    let addr = format!("{}:{}", args.host, args.port);

    match args.command {
        ClientCommands::Analyze(command) => {
            let bytes = tokio::fs::read(&command.image_path).await?;
            let file_name = command
                .image_path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "upload".to_string());
            let form = reqwest::multipart::Form::new().part(
                medscan::server::UPLOAD_FIELD,
                reqwest::multipart::Part::bytes(bytes).file_name(file_name),
            );

            let response = client
                .post(format!("http://{}/analyze", addr))
                .multipart(form)
                .send()
                .await?;

            let result = response.json::<serde_json::Value>().await?;
            for notice in result["notices"].as_array().into_iter().flatten() {
                eprintln!(
                    "[{}] {}",
                    notice["level"].as_str().unwrap_or("info"),
                    notice["message"].as_str().unwrap_or_default()
                );
            }
            match result["markdown"].as_str() {
                Some(markdown) => println!("{markdown}"),
                None => println!("Result: {}", serde_json::to_string_pretty(&result)?),
            }
        }
        ClientCommands::Status(_) => {
            let response = client
                .get(format!("http://{}/status", addr))
                .send()
                .await?;

            let result = response.json::<serde_json::Value>().await?;
            println!("Result: {}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}
