use anyhow::Result;
use clap::Parser;
use colored::Colorize;

use usplane::backend::{self, TrainingBackend};
use usplane::training::orchestrator;
use usplane::utils::logging::{init_logging, LogConfig};
use usplane::TrainConfig;

fn main() -> Result<()> {
    let config = TrainConfig::parse();
    init_logging(&LogConfig::from_verbose(config.verbose)).map_err(anyhow::Error::msg)?;

    println!("{}", format!("usplane {}", usplane::VERSION).green().bold());
    println!("  backend:  {}", backend::backend_name());
    println!("  model:    {} ({:?})", config.model_name, config.backbone);
    println!("  mode:     {}", config.mode);
    println!("  epochs:   {}", config.epochs);
    println!();

    let primary = config.device_ids.first().copied().unwrap_or(0);
    let device = backend::default_device(primary);

    let report = orchestrator::fit::<TrainingBackend>(&config, device)?;

    println!();
    println!("{}", "Training complete".green().bold());
    println!(
        "  best epoch {}: test acc {:.4}, test AUC {:.4}",
        report.best.epoch, report.best.test_acc, report.best.test_auc
    );
    Ok(())
}
