//! Shared fixtures: a temporary build/data layout with a scripted fake
//! simulation executable and a fake merge tool that record how they were run.

#![allow(dead_code)]

use parsim_core::config::{SimulationConfig, SimulationSettings};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// How the fake executable behaves, keyed by job id
#[derive(Debug, Clone, Default)]
pub struct FakeSimulation {
    /// Exit 1 with a message on stderr
    pub fail_jobs: Vec<u32>,
    /// Exit 0 without writing the output artifact
    pub skip_artifact_jobs: Vec<u32>,
    /// Also write ProcessIDMap.txt
    pub process_map_jobs: Vec<u32>,
    /// Leave a read-only `locked/` subdirectory that cannot be emptied
    pub lock_dir_jobs: Vec<u32>,
    /// Write several hundred KiB to stdout and stderr before finishing
    pub noisy_jobs: Vec<u32>,
}

impl FakeSimulation {
    pub fn succeeding() -> Self {
        Self {
            process_map_jobs: vec![0],
            ..Self::default()
        }
    }

    pub fn failing(jobs: &[u32]) -> Self {
        Self {
            fail_jobs: jobs.to_vec(),
            ..Self::succeeding()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeInvocation {
    pub cwd: PathBuf,
    pub args: Vec<String>,
}

pub struct SimFixture {
    pub root: TempDir,
    pub build_dir: PathBuf,
    pub data_dir: PathBuf,
    pub launch_log: PathBuf,
    pub merge_log: PathBuf,
    pub merge_tool: PathBuf,
}

impl SimFixture {
    pub fn new() -> Self {
        let root = TempDir::new().expect("temp dir");
        let build_dir = root.path().join("build");
        let data_dir = root.path().join("data");
        fs::create_dir_all(&build_dir).unwrap();
        fs::create_dir_all(&data_dir).unwrap();

        let fixture = Self {
            launch_log: root.path().join("launches.log"),
            merge_log: root.path().join("merges.log"),
            merge_tool: root.path().join("bin").join("fake-hadd"),
            build_dir,
            data_dir,
            root,
        };
        fixture.install_merge_tool(0);
        fixture
    }

    /// Write `build/CsI_Axion` as a shell script with the given behavior
    pub fn install_executable(&self, behavior: &FakeSimulation) {
        let script = format!(
            r#"#!/bin/sh
job=$(sed -n 's|^/CsI/random/seed \([0-9][0-9]*\) .*|\1|p' "$1")
pwd >> '{log}'
case " {noisy} " in *" $job "*) yes "G4WT0 > event processed" | head -n 40000; yes "warning" | head -n 40000 >&2 ;; esac
case " {fail} " in *" $job "*) echo "fatal error in job $job" >&2; exit 1 ;; esac
case " {skip} " in *" $job "*) exit 0 ;; esac
case " {map} " in *" $job "*) echo "0 primary" > ProcessIDMap.txt ;; esac
case " {lock} " in *" $job "*) mkdir locked; touch locked/keep; chmod 555 locked ;; esac
echo "job $job $(grep beamOn "$1")" > CsI_Axion.root
exit 0
"#,
            log = self.launch_log.display(),
            fail = join_ids(&behavior.fail_jobs),
            skip = join_ids(&behavior.skip_artifact_jobs),
            map = join_ids(&behavior.process_map_jobs),
            lock = join_ids(&behavior.lock_dir_jobs),
            noisy = join_ids(&behavior.noisy_jobs),
        );
        write_script(&self.build_dir.join("CsI_Axion"), &script);
    }

    /// Replace the fake merge tool with one exiting `exit_code`
    pub fn install_merge_tool(&self, exit_code: i32) {
        let script = format!(
            r#"#!/bin/sh
{{ echo "cwd=$(pwd)"; for arg in "$@"; do echo "arg=$arg"; done; echo "---"; }} >> '{log}'
if [ {code} -eq 0 ]; then
  out="$2"; shift 2; cat "$@" > "$out"
fi
exit {code}
"#,
            log = self.merge_log.display(),
            code = exit_code,
        );
        fs::create_dir_all(self.merge_tool.parent().unwrap()).unwrap();
        write_script(&self.merge_tool, &script);
    }

    pub fn settings(&self, num_jobs: u32, events_per_job: u64) -> SimulationSettings {
        SimulationSettings {
            build_dir: self.build_dir.clone(),
            data_dir: self.data_dir.clone(),
            num_jobs,
            events_per_job,
            merge_tool: self.merge_tool.display().to_string(),
            ..SimulationSettings::default()
        }
    }

    pub fn config(&self, num_jobs: u32, events_per_job: u64) -> Arc<SimulationConfig> {
        Arc::new(SimulationConfig::try_from(self.settings(num_jobs, events_per_job)).unwrap())
    }

    /// Working directories the fake executable was launched in
    pub fn launched_work_dirs(&self) -> Vec<String> {
        let mut dirs: Vec<String> = fs::read_to_string(&self.launch_log)
            .unwrap_or_default()
            .lines()
            .map(|line| {
                Path::new(line)
                    .file_name()
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        dirs.sort();
        dirs
    }

    pub fn remaining_work_dirs(&self) -> Vec<PathBuf> {
        self.build_entries()
            .into_iter()
            .filter(|name| name.starts_with("work_"))
            .map(|name| self.build_dir.join(name))
            .collect()
    }

    /// Per-job artifacts currently in the build directory, sorted
    pub fn job_artifacts(&self) -> Vec<String> {
        self.build_entries()
            .into_iter()
            .filter(|name| name.starts_with("output_"))
            .collect()
    }

    pub fn data_entries(&self) -> Vec<String> {
        sorted_entries(&self.data_dir)
    }

    pub fn merge_invocations(&self) -> Vec<MergeInvocation> {
        let log = fs::read_to_string(&self.merge_log).unwrap_or_default();
        let mut invocations = Vec::new();
        let mut current = MergeInvocation {
            cwd: PathBuf::new(),
            args: Vec::new(),
        };
        for line in log.lines() {
            if let Some(cwd) = line.strip_prefix("cwd=") {
                current.cwd = PathBuf::from(cwd);
            } else if let Some(arg) = line.strip_prefix("arg=") {
                current.args.push(arg.to_string());
            } else if line == "---" {
                invocations.push(std::mem::replace(
                    &mut current,
                    MergeInvocation {
                        cwd: PathBuf::new(),
                        args: Vec::new(),
                    },
                ));
            }
        }
        invocations
    }

    /// Whether directory permissions are enforced for this process. They are
    /// not for root, so tests relying on a read-only directory skip.
    pub fn permissions_enforced(&self) -> bool {
        let dir = self.root.path().join("permission-check");
        fs::create_dir_all(&dir).unwrap();
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o555)).unwrap();
        let denied = fs::write(dir.join("file"), b"").is_err();
        fs::set_permissions(&dir, fs::Permissions::from_mode(0o755)).unwrap();
        fs::remove_dir_all(&dir).unwrap();
        denied
    }

    /// Make every directory under `path` writable again so it can be removed
    pub fn unlock(&self, path: &Path) {
        for entry in fs::read_dir(path).unwrap() {
            let entry = entry.unwrap();
            if entry.file_type().unwrap().is_dir() {
                fs::set_permissions(entry.path(), fs::Permissions::from_mode(0o755)).unwrap();
                self.unlock(&entry.path());
            }
        }
    }

    fn build_entries(&self) -> Vec<String> {
        sorted_entries(&self.build_dir)
    }
}

fn sorted_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

fn join_ids(ids: &[u32]) -> String {
    ids.iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(" ")
}

fn write_script(path: &Path, contents: &str) {
    fs::write(path, contents).unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}
