use crate::panel::PricePanel;
use anyhow::Result;
use log::info;
use std::path::Path;

pub fn run(data_file: &Path, output_path: &Path) -> Result<()> {
    info!("Generating panel snapshot at {}", output_path.display());

    let panel = PricePanel::load_from_csv(data_file)?;
    panel.save_to_snapshot(output_path)?;

    info!(
        "Panel snapshot successfully written to {}",
        output_path.display()
    );
    Ok(())
}
