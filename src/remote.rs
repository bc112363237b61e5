use crate::config::RemoteConfig;
use crate::error::TransportError;
use std::ffi::OsString;
use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use tracing::debug;

/// Exit status `ssh` uses for its own failures (as opposed to the remote command's).
const SSH_FAILURE_STATUS: i32 = 255;

/// Something that can read a whole file from the remote host.
///
/// An empty file is an empty payload. A file that is absent or cannot be
/// read is an error; [`TransportError::is_absent`] tells the two apart.
pub trait RemoteSource {
    fn read(&mut self, path: &str) -> Result<Vec<u8>, TransportError>;
}

/// Reads remote files by running `sudo -S cat` over the system `ssh` client.
///
/// Authentication to the host is left to ssh (keys or agent); the configured
/// password is only fed to `sudo` on stdin.
pub struct SshSource {
    config: RemoteConfig,
    program: OsString,
    leading_args: Vec<OsString>,
}

impl SshSource {
    pub fn new(config: RemoteConfig) -> Self {
        Self {
            config,
            program: "ssh".into(),
            leading_args: Vec::new(),
        }
    }

    /// Run `script` through `sh` in place of the ssh client.
    #[cfg(test)]
    fn via_script(mut self, script: &std::path::Path) -> Self {
        self.program = "sh".into();
        self.leading_args = vec![script.into()];
        self
    }

    fn command(&self, path: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args)
            .arg("-o")
            .arg("BatchMode=yes")
            .arg("-o")
            .arg(format!("ConnectTimeout={}", self.config.timeout.as_secs().max(1)))
            .arg("-p")
            .arg(self.config.port.to_string())
            .arg(format!("{}@{}", self.config.user, self.config.host))
            .arg(format!("sudo -S -p '' cat -- {}", shell_quote(path)))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

impl RemoteSource for SshSource {
    fn read(&mut self, path: &str) -> Result<Vec<u8>, TransportError> {
        debug!(host = %self.config.host, path, "reading remote file");

        let mut child = self.command(path).spawn().map_err(TransportError::Spawn)?;

        if let Some(mut stdin) = child.stdin.take() {
            // sudo may not ask for a password at all; a closed pipe is fine.
            let _ = writeln!(stdin, "{}", self.config.password);
        }

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::Connection("stdout was not captured".into()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| TransportError::Connection("stderr was not captured".into()))?;

        // Drain both pipes off-thread so the deadline can be enforced here.
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let err_reader = thread::spawn(move || {
                let mut err = Vec::new();
                stderr.read_to_end(&mut err).map(|_| err)
            });
            let mut out = Vec::new();
            let result = stdout.read_to_end(&mut out).and_then(|_| {
                let err = err_reader
                    .join()
                    .unwrap_or_else(|_| Ok(Vec::new()))?;
                Ok((out, err))
            });
            let _ = tx.send(result);
        });

        let (out, err) = match rx.recv_timeout(self.config.timeout) {
            Ok(result) => result?,
            Err(RecvTimeoutError::Timeout) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(TransportError::Timeout(self.config.timeout));
            }
            Err(RecvTimeoutError::Disconnected) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(TransportError::Connection("output reader stopped".into()));
            }
        };

        let status = child.wait()?;
        if status.code() == Some(SSH_FAILURE_STATUS) {
            return Err(TransportError::Connection(
                String::from_utf8_lossy(&err).trim().to_string(),
            ));
        }
        if !status.success() {
            let stderr = String::from_utf8_lossy(&err).trim().to_string();
            debug!(path, status = ?status.code(), %stderr, "remote command failed");
            return Err(TransportError::Remote {
                status: status.code(),
                stderr,
            });
        }
        Ok(out)
    }
}

/// Quote a path for a POSIX shell.
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config() -> RemoteConfig {
        RemoteConfig {
            user: "deploy".into(),
            host: "web1".into(),
            password: "hunter2".into(),
            port: 2222,
            timeout: Duration::from_secs(10),
        }
    }

    #[test]
    fn quotes_plain_paths() {
        assert_eq!(shell_quote("/var/log/nginx/access.log.3"), "'/var/log/nginx/access.log.3'");
    }

    #[test]
    fn quotes_embedded_single_quotes() {
        assert_eq!(shell_quote("a'b"), r"'a'\''b'");
    }

    #[test]
    fn command_targets_host_and_path() {
        let source = SshSource::new(config());
        let cmd = source.command("/var/log/app.log.1");
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(cmd.get_program(), "ssh");
        assert!(args.contains(&"deploy@web1".to_string()));
        assert!(args.contains(&"2222".to_string()));
        assert!(args.contains(&"ConnectTimeout=10".to_string()));
        assert_eq!(
            args.last().map(String::as_str),
            Some("sudo -S -p '' cat -- '/var/log/app.log.1'")
        );
        // The password must never appear on the command line.
        assert!(!args.iter().any(|a| a.contains("hunter2")));
    }

    #[cfg(unix)]
    mod scripted {
        use super::*;
        use std::fs;
        use tempfile::TempDir;

        /// A source whose "ssh" is the given shell script.
        fn scripted(body: &str, timeout: Duration) -> (TempDir, SshSource) {
            let tmp = tempfile::tempdir().unwrap();
            let script = tmp.path().join("fake-ssh.sh");
            fs::write(&script, body).unwrap();
            let source = SshSource::new(RemoteConfig { timeout, ..config() }).via_script(&script);
            (tmp, source)
        }

        #[test]
        fn successful_read_returns_stdout() {
            let (_tmp, mut source) = scripted(
                "cat > /dev/null\nprintf 'line one\\nline two\\n'\n",
                Duration::from_secs(10),
            );
            let data = source.read("/var/log/nginx/access.log").unwrap();
            assert_eq!(data, b"line one\nline two\n");
        }

        #[test]
        fn password_reaches_stdin() {
            let (_tmp, mut source) = scripted("cat\n", Duration::from_secs(10));
            let data = source.read("/var/log/nginx/access.log").unwrap();
            assert_eq!(data, b"hunter2\n");
        }

        #[test]
        fn ssh_failure_is_a_connection_error() {
            let (_tmp, mut source) = scripted(
                "echo 'ssh: connect to host web1 port 2222: Connection refused' >&2\nexit 255\n",
                Duration::from_secs(10),
            );
            match source.read("/var/log/nginx/access.log") {
                Err(TransportError::Connection(msg)) => assert!(msg.contains("Connection refused")),
                other => panic!("unexpected result: {other:?}"),
            }
        }

        #[test]
        fn sudo_rejection_is_an_error_not_an_empty_file() {
            let (_tmp, mut source) = scripted(
                "echo 'sudo: 1 incorrect password attempt' >&2\nexit 1\n",
                Duration::from_secs(10),
            );
            let err = source.read("/var/log/nginx/access.log").unwrap_err();
            assert!(matches!(err, TransportError::Remote { status: Some(1), .. }));
            assert!(!err.is_absent());
        }

        #[test]
        fn missing_file_is_reported_as_absent() {
            let (_tmp, mut source) = scripted(
                "echo 'cat: /var/log/nginx/access.log.4: No such file or directory' >&2\nexit 1\n",
                Duration::from_secs(10),
            );
            let err = source.read("/var/log/nginx/access.log.4").unwrap_err();
            assert!(err.is_absent());
        }

        #[test]
        fn slow_remote_times_out() {
            let (_tmp, mut source) = scripted("exec sleep 5\n", Duration::from_millis(200));
            let err = source.read("/var/log/nginx/access.log").unwrap_err();
            assert!(matches!(err, TransportError::Timeout(d) if d == Duration::from_millis(200)));
        }
    }
}
