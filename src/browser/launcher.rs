use crate::config::BrowserConfig;
use std::process::Command;

/// Build the Chrome launch command with CDP enabled
pub fn build_command(config: &BrowserConfig, cdp_port: u16) -> Command {
    let mut cmd = Command::new(&config.chrome_path);

    // User data directory (required; keeps the session isolated)
    cmd.arg(format!(
        "--user-data-dir={}",
        config.user_data_dir.display()
    ));

    // Enable remote debugging
    cmd.arg(format!("--remote-debugging-port={}", cdp_port));

    // Headless mode
    if config.headless {
        cmd.arg("--headless=new");
        cmd.arg("--disable-gpu");
    }

    // Disable some features that might interfere
    cmd.arg("--no-first-run");
    cmd.arg("--no-default-browser-check");
    cmd.arg("--disable-background-networking");
    cmd.arg("--disable-sync");

    // Custom arguments
    for arg in &config.custom_args {
        cmd.arg(arg);
    }

    // Start on about:blank; the supervisor navigates explicitly
    cmd.arg("about:blank");

    // Don't tie Chrome's lifetime to our terminal
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        unsafe {
            cmd.pre_exec(|| {
                // Create new process group
                libc::setsid();
                Ok(())
            });
        }
    }

    cmd
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn test_config() -> BrowserConfig {
        BrowserConfig {
            chrome_path: PathBuf::from("/usr/bin/google-chrome"),
            user_data_dir: PathBuf::from("/tmp/flowsync-profile"),
            headless: false,
            start_url: "https://labs.google/fx/tools/flow".to_string(),
            custom_args: vec![],
        }
    }

    #[test]
    fn test_build_command_basic() {
        let cmd = build_command(&test_config(), 9230);
        let args: Vec<String> = cmd
            .get_args()
            .map(|s| s.to_string_lossy().to_string())
            .collect();

        assert!(args.contains(&"--user-data-dir=/tmp/flowsync-profile".to_string()));
        assert!(args.contains(&"--remote-debugging-port=9230".to_string()));
        assert!(args.contains(&"--no-first-run".to_string()));
        assert!(!args.contains(&"--headless=new".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("about:blank"));
    }

    #[test]
    fn test_build_command_headless_and_custom_args() {
        let mut config = test_config();
        config.headless = true;
        config.custom_args = vec!["--lang=en-US".to_string()];

        let cmd = build_command(&config, 9222);
        let args: Vec<String> = cmd
            .get_args()
            .map(|s| s.to_string_lossy().to_string())
            .collect();

        assert!(args.contains(&"--headless=new".to_string()));
        assert!(args.contains(&"--disable-gpu".to_string()));
        assert!(args.contains(&"--lang=en-US".to_string()));
    }
}
