// Model download for the local ONNX scorer.
//
// Fetches an ONNX export of unitary/toxic-bert (six Jigsaw heads) plus its
// tokenizer from HuggingFace into the model directory, by default
// ~/.local/share/toxwatch/models/ on Linux. Files that already exist are
// left alone, so re-running is cheap.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::AsyncWriteExt;
use tracing::info;

use super::onnx::{MODEL_FILE, TOKENIZER_FILE};

/// HuggingFace repo holding the ONNX conversion of toxic-bert.
pub const TOXIC_BERT_HF_URL: &str = "https://huggingface.co/Xenova/toxic-bert/resolve/main";

/// Remote path of each local file, relative to the repo root.
const REMOTE_FILES: [(&str, &str); 2] = [
    (TOKENIZER_FILE, "tokenizer.json"),
    (MODEL_FILE, "onnx/model.onnx"),
];

/// `(local path, url)` for every file the scorer needs.
pub fn download_plan(dir: &Path) -> Vec<(PathBuf, String)> {
    REMOTE_FILES
        .iter()
        .map(|(local, remote)| (dir.join(local), format!("{TOXIC_BERT_HF_URL}/{remote}")))
        .collect()
}

/// Download any missing model files into `dir`.
///
/// Returns the number of files fetched.
pub async fn download_model(dir: &Path) -> Result<usize> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create model directory: {}", dir.display()))?;

    let client = reqwest::Client::new();
    let mut fetched = 0;
    for (dest, url) in download_plan(dir) {
        let name = dest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if dest.exists() {
            info!(file = %dest.display(), "Already present, skipping");
            println!("  {name} (already exists)");
            continue;
        }
        println!("  Downloading {name}...");
        download_file(&client, &url, &dest).await?;
        fetched += 1;
    }
    Ok(fetched)
}

/// Stream `url` into `dest`. The body goes to `<dest>.part` first and is
/// renamed into place once complete, so an interrupted download never
/// looks like a usable model file.
async fn download_file(client: &reqwest::Client, url: &str, dest: &Path) -> Result<()> {
    let mut response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to download {url}"))?;

    if !response.status().is_success() {
        anyhow::bail!("Download failed with status {}: {}", response.status(), url);
    }

    let pb = match response.content_length() {
        Some(size) => {
            let pb = ProgressBar::new(size);
            if let Ok(style) =
                ProgressStyle::default_bar().template("    [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
            {
                pb.set_style(style.progress_chars("=> "));
            }
            pb
        }
        None => {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner().template("    {spinner} {bytes}") {
                pb.set_style(style);
            }
            pb
        }
    };

    let mut part = dest.as_os_str().to_owned();
    part.push(".part");
    let part = PathBuf::from(part);

    let mut file = tokio::fs::File::create(&part)
        .await
        .with_context(|| format!("Failed to create {}", part.display()))?;
    while let Some(chunk) = response
        .chunk()
        .await
        .with_context(|| format!("Failed to read response body from {url}"))?
    {
        file.write_all(&chunk)
            .await
            .with_context(|| format!("Failed to write {}", part.display()))?;
        pb.inc(chunk.len() as u64);
    }
    file.flush().await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(&part, dest)
        .await
        .with_context(|| format!("Failed to move download into {}", dest.display()))?;
    pb.finish_and_clear();

    info!(url, dest = %dest.display(), "Downloaded");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toxicity::onnx::model_files_present;

    #[test]
    fn plan_covers_both_scorer_files() {
        let dir = PathBuf::from("/tmp/models");
        let plan = download_plan(&dir);
        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].0, dir.join(TOKENIZER_FILE));
        assert!(plan[0].1.ends_with("/tokenizer.json"));
        assert_eq!(plan[1].0, dir.join(MODEL_FILE));
        assert!(plan[1].1.ends_with("/onnx/model.onnx"));
        assert!(plan.iter().all(|(_, url)| url.starts_with(TOXIC_BERT_HF_URL)));
    }

    #[tokio::test]
    async fn existing_files_are_not_fetched_again() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MODEL_FILE), b"fake").unwrap();
        std::fs::write(dir.path().join(TOKENIZER_FILE), b"fake").unwrap();

        assert_eq!(download_model(dir.path()).await.unwrap(), 0);
        assert!(model_files_present(dir.path()));
    }
}
