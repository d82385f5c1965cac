use std::{
    collections::HashSet,
    fmt::Write as _,
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::{error::VhsError, structs::AnalysisResult};

pub fn format_processing_time(ms: f64) -> String {
    if ms < 1000.0 {
        format!("{:.0}ms", ms)
    } else {
        format!("{:.2}s", ms / 1000.0)
    }
}

pub fn format_file_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.2} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

pub fn export_json(result: &AnalysisResult) -> Result<String, VhsError> {
    serde_json::to_string_pretty(result).map_err(|e| VhsError::Other(e.to_string()))
}

/// Human readable summary of an analysis, one fact per line.
pub fn summary(result: &AnalysisResult) -> String {
    let m = &result.measurements;
    let c = &result.classification;

    let mut out = String::new();
    let _ = writeln!(out, "VHS score:      {:.2}", m.vhs_score);
    let _ = writeln!(
        out,
        "Long axis:      {:.2} ({} vertebrae)",
        m.long_axis, m.long_axis_vertebrae
    );
    let _ = writeln!(
        out,
        "Short axis:     {:.2} ({} vertebrae)",
        m.short_axis, m.short_axis_vertebrae
    );
    let _ = writeln!(out, "Classification: {}", c.classification);
    let _ = writeln!(out, "Severity:       {}", c.severity);
    let _ = writeln!(out, "Confidence:     {}", c.confidence);
    let _ = writeln!(out, "Recommendation: {}", c.recommendation);
    for note in &c.clinical_notes {
        let _ = writeln!(out, "  - {}", note);
    }
    let _ = writeln!(out, "Keypoints:      {}", result.keypoints.len());
    if let Some(version) = result.model_version() {
        let _ = writeln!(out, "Model:          {}", version);
    }
    let _ = write!(
        out,
        "Processed in:   {}",
        format_processing_time(result.processing_time_ms)
    );
    out
}

/// Writes the JSON export and, when the backend sent one, the overlay image
/// into `dir`. Files are named after `stem`. Returns the written paths.
pub async fn save_results(
    result: &AnalysisResult,
    dir: &Path,
    stem: &str,
) -> Result<Vec<PathBuf>, VhsError> {
    tokio::fs::create_dir_all(dir).await?;
    let mut written = Vec::new();

    let json_path = dir.join(format!("{}-vhs-results.json", stem));
    tokio::fs::write(&json_path, export_json(result)?).await?;
    written.push(json_path);

    if let Some(overlay) = result.overlay_bytes()? {
        let overlay_path = dir.join(format!("{}-vhs-overlay.png", stem));
        tokio::fs::write(&overlay_path, overlay).await?;
        written.push(overlay_path);
    }

    debug!("Saved {:?}", written);
    Ok(written)
}

/// Names the results of each radiograph, in order, so that no two of them
/// share a name. Paths under `base` are named after their relative path, with
/// `_` between the directories, and repeated names get a `-2`, `-3`... suffix.
pub fn result_stems(paths: &[PathBuf], base: Option<&Path>) -> Vec<String> {
    let mut used = HashSet::new();
    paths
        .iter()
        .map(|path| {
            let stem = path_stem(path, base);
            let mut unique = stem.clone();
            let mut n = 2;
            while !used.insert(unique.clone()) {
                unique = format!("{}-{}", stem, n);
                n += 1;
            }
            unique
        })
        .collect()
}

fn path_stem(path: &Path, base: Option<&Path>) -> String {
    let relative = base
        .and_then(|base| path.strip_prefix(base).ok())
        .unwrap_or(path);

    let file = relative
        .file_stem()
        .or_else(|| relative.file_name())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "radiograph".to_string());

    if base.is_none() {
        return file;
    }

    let mut parts: Vec<String> = relative
        .parent()
        .into_iter()
        .flat_map(|parent| parent.iter())
        .map(|s| s.to_string_lossy().into_owned())
        .collect();
    parts.push(file);
    parts.join("_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::SAMPLE_RESPONSE;

    fn sample() -> AnalysisResult {
        serde_json::from_str(SAMPLE_RESPONSE).unwrap()
    }

    #[test]
    fn test_format_processing_time() {
        assert_eq!(format_processing_time(0.0), "0ms");
        assert_eq!(format_processing_time(842.7), "843ms");
        assert_eq!(format_processing_time(1000.0), "1.00s");
        assert_eq!(format_processing_time(12346.0), "12.35s");
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(2048), "2.00 KB");
        assert_eq!(format_file_size(10 * 1024 * 1024), "10.00 MB");
    }

    #[test]
    fn test_summary() {
        let text = summary(&sample());
        assert!(text.contains("VHS score:      10.40"));
        assert!(text.contains("Classification: Borderline"));
        assert!(text.contains("  - Slight enlargement of the left atrium"));
        assert!(text.contains("Model:          hrnet-1.2"));
        assert!(text.ends_with("Processed in:   843ms"));
    }

    #[test]
    fn test_export_is_parseable() {
        let result = sample();
        let exported = export_json(&result).unwrap();
        let back: AnalysisResult = serde_json::from_str(&exported).unwrap();
        assert_eq!(back, result);
    }

    #[tokio::test]
    async fn test_save_results() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");

        let written = save_results(&sample(), &out, "rx1").await.unwrap();
        assert_eq!(
            written,
            vec![out.join("rx1-vhs-results.json"), out.join("rx1-vhs-overlay.png")]
        );
        assert_eq!(
            std::fs::read(&written[1]).unwrap(),
            b"\x89PNG\r\n\x1a\n".to_vec()
        );

        let mut result = sample();
        result.overlay_image = None;
        let written = save_results(&result, &out, "rx2").await.unwrap();
        assert_eq!(written.len(), 1);
    }

    #[test]
    fn test_result_stems_never_collide() {
        let paths = vec![
            PathBuf::from("rx.jpg"),
            PathBuf::from("rx.png"),
            PathBuf::from("lateral.png"),
            PathBuf::from("rx"),
        ];
        assert_eq!(
            result_stems(&paths, None),
            vec!["rx", "rx-2", "lateral", "rx-3"]
        );

        let base = Path::new("/data/in");
        let paths = vec![
            base.join("a").join("rx.png"),
            base.join("b").join("rx.png"),
            base.join("rx.png"),
            base.join("a_rx.jpg"),
        ];
        assert_eq!(
            result_stems(&paths, Some(base)),
            vec!["a_rx", "b_rx", "rx", "a_rx-2"]
        );
    }

    #[tokio::test]
    async fn test_distinct_stems_keep_every_result() {
        let dir = tempfile::tempdir().unwrap();
        let base = Path::new("in");
        let paths = vec![base.join("a").join("rx.png"), base.join("b").join("rx.png")];

        let mut saved = Vec::new();
        for stem in result_stems(&paths, Some(base)) {
            saved.extend(save_results(&sample(), dir.path(), &stem).await.unwrap());
        }
        assert_eq!(saved.len(), 4);
        assert!(saved.iter().all(|p| p.exists()));
    }
}
