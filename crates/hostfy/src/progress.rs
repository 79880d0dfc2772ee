use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// 長い処理（イメージ取得、healthy 待ち）の間に表示するスピナー
pub struct Spinner {
    progress_bar: ProgressBar,
}

impl Spinner {
    pub fn new(message: impl Into<String>) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) =
            ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")
        {
            pb.set_style(style);
        }
        pb.set_message(message.into());
        pb.enable_steady_tick(Duration::from_millis(100));
        Self { progress_bar: pb }
    }

    /// スピナーを消す（結果の表示は呼び出し側）
    pub fn finish(&self) {
        self.progress_bar.finish_and_clear();
    }
}
