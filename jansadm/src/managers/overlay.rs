use crate::managers::backup::copy_directory;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Lists the profile subpaths that replace their base directory wholesale.
pub const PROFILE_DIRS_MANIFEST: &str = ".profiledirs";

#[derive(Debug, Default)]
pub struct OverlaySummary {
    pub replaced: Vec<PathBuf>,
    pub copied: Vec<PathBuf>,
}

/// Applies the overlay tree `<setup_dir>/<profile>` onto `setup_dir`.
///
/// Subpaths named in the manifest are deleted in the base tree and copied
/// over as a whole; every other overlay file is copied on top of the base
/// tree, leaving unrelated base files alone.
pub fn apply(setup_dir: &Path, profile: &str) -> Result<OverlaySummary> {
    println!("🧩 Preparing setup for profile {profile}");

    let mut summary = OverlaySummary::default();
    let profile_dir = setup_dir.join(profile);
    if !profile_dir.is_dir() {
        println!(
            "⚠️  Profile directory {} does not exist, nothing to overlay",
            profile_dir.display()
        );
        return Ok(summary);
    }

    let mut replaced_sources = Vec::new();
    for subpath in read_manifest(&profile_dir)? {
        let source = profile_dir.join(&subpath);
        let target = setup_dir.join(&subpath);
        replaced_sources.push(source.clone());

        if !source.exists() {
            tracing::warn!("Profile path {} listed but missing", source.display());
            continue;
        }

        if target.is_dir() {
            fs::remove_dir_all(&target)
                .context(format!("Failed to remove {}", target.display()))?;
        } else if target.exists() {
            fs::remove_file(&target).context(format!("Failed to remove {}", target.display()))?;
        }

        if source.is_dir() {
            copy_directory(&source, &target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(&source, &target).context(format!("Failed to copy {}", source.display()))?;
        }

        println!("  ✓ Replaced {}", target.display());
        summary.replaced.push(target);
    }

    let walker = WalkDir::new(&profile_dir)
        .into_iter()
        .filter_entry(|e| !replaced_sources.iter().any(|r| e.path().starts_with(r)));

    for entry in walker {
        let entry = entry.context("Failed to read profile directory entry")?;
        if !entry.file_type().is_file() || entry.file_name() == PROFILE_DIRS_MANIFEST {
            continue;
        }

        let relative = entry.path().strip_prefix(&profile_dir)?;
        let target = setup_dir.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .context(format!("Failed to create {}", parent.display()))?;
        }

        tracing::debug!("Copying {} to {}", entry.path().display(), target.display());
        fs::copy(entry.path(), &target)
            .context(format!("Failed to copy {}", entry.path().display()))?;
        summary.copied.push(target);
    }

    println!(
        "✓ Applied profile {profile}: {} replaced, {} files copied",
        summary.replaced.len(),
        summary.copied.len()
    );
    Ok(summary)
}

/// Non-empty, trimmed manifest lines with `.` components dropped. Entries
/// escaping the profile directory or naming the profile root are ignored.
fn read_manifest(profile_dir: &Path) -> Result<Vec<PathBuf>> {
    let manifest = profile_dir.join(PROFILE_DIRS_MANIFEST);
    if !manifest.is_file() {
        return Ok(vec![]);
    }

    let contents = fs::read_to_string(&manifest)
        .context(format!("Failed to read {}", manifest.display()))?;

    let mut subpaths = Vec::new();
    for line in contents.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match normalize(Path::new(line)) {
            Some(subpath) => subpaths.push(subpath),
            None => tracing::warn!("Ignoring profile path <{line}> outside of the profile"),
        }
    }
    Ok(subpaths)
}

fn normalize(path: &Path) -> Option<PathBuf> {
    let mut subpath = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(name) => subpath.push(name),
            Component::CurDir => {}
            _ => return None,
        }
    }
    (!subpath.as_os_str().is_empty()).then_some(subpath)
}
