//! Progress reporting

use indicatif::{ProgressBar, ProgressStyle};
use spimem_fs::FsProgress;

use crate::error::Result;

fn create_progress_bar(total: u64, phase: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(&format!(
                "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} ({{bytes_per_sec}}, {{eta}}) {}",
                phase
            ))?
            .progress_chars("#>-"),
    );
    Ok(pb)
}

/// Progress reporter using an indicatif progress bar
#[derive(Default)]
pub struct IndicatifProgress {
    bar: Option<ProgressBar>,
}

impl FsProgress for IndicatifProgress {
    fn erasing(&mut self, total_bytes: u64) {
        let pb = create_progress_bar(total_bytes, "Erasing")
            .unwrap_or_else(|_| ProgressBar::new(total_bytes));
        self.bar = Some(pb);
    }

    fn erase_progress(&mut self, bytes_erased: u64) {
        if let Some(pb) = &self.bar {
            pb.set_position(bytes_erased);
        }
    }

    fn complete(&mut self) {
        if let Some(pb) = self.bar.take() {
            pb.finish_with_message("Erase complete");
        }
    }
}
