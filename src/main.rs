use medscan::{
    AnalysisEngine, GeminiModel,
    config::{AppConfig, MedscanArgs},
    server,
};
use std::sync::Arc;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: MedscanArgs = argh::from_env();
    let config = AppConfig::from_env(args)?;

    log::info!("Using model {:?}", config.gemini);

    // the blocking HTTP client has to be built outside the async runtime
    let model = GeminiModel::new(config.gemini.clone())?;
    let engine = Arc::new(AnalysisEngine::new(model, config.scratch_dir.clone()));
    let app = server::router(engine.clone(), config.max_upload_bytes);

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(server::serve(&config.addr, app))?;

    // joins the worker thread once the server is gone
    drop(engine);
    Ok(())
}
