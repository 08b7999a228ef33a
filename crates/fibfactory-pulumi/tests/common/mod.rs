#![allow(dead_code)]

use std::path::{Path, PathBuf};

const FAKE_PULUMI: &str = include_str!("../fixtures/fake-pulumi.sh");

/// Environment variable holding the fake pulumi's state directory
pub const STATE_ENV: &str = "FAKE_PULUMI_STATE";

/// Scriptable stand-in for the pulumi binary, rooted in a temporary directory
pub struct FakePulumi {
    root: tempfile::TempDir,
}

impl FakePulumi {
    pub fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let binary = root.path().join("pulumi");
        std::fs::write(&binary, FAKE_PULUMI).unwrap();
        make_executable(&binary);

        let fake = Self { root };
        std::fs::create_dir_all(fake.state_dir()).unwrap();
        std::fs::create_dir_all(fake.program_dir()).unwrap();
        std::fs::write(
            fake.program_dir().join("Pulumi.yaml"),
            "name: fibfactory\nruntime: yaml\n",
        )
        .unwrap();
        fake
    }

    pub fn binary(&self) -> PathBuf {
        self.root.path().join("pulumi")
    }

    pub fn state_dir(&self) -> PathBuf {
        self.root.path().join("state")
    }

    pub fn program_dir(&self) -> PathBuf {
        self.root.path().join("program")
    }

    /// Make the next `up` calls fail with `message` on stdout and nothing on stderr
    pub fn fail_up(&self, message: &str) {
        std::fs::write(self.state_dir().join("fail-up"), format!("{}\n", message)).unwrap();
    }

    pub fn is_deployed(&self, stack: &str) -> bool {
        self.state_dir()
            .join("stacks")
            .join(format!("{}.deployed", stack))
            .exists()
    }

    /// Every invocation so far, one line of arguments each
    pub fn calls(&self) -> Vec<String> {
        std::fs::read_to_string(self.state_dir().join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(|line| {
                // drop the `--non-interactive --cwd <dir>` prefix
                line.splitn(4, ' ').nth(3).unwrap_or_default().to_string()
            })
            .collect()
    }

    pub fn called(&self, args: &str) -> bool {
        self.calls().iter().any(|call| call == args)
    }
}

#[cfg(unix)]
fn make_executable(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}
