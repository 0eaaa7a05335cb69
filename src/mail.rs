use anyhow::{Context, Result};
use std::io;
use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use url::Url;

pub(crate) const RECIPIENT: &str = "aj@masaic.ai";
pub(crate) const SUBJECT: &str = "Notify me about Masaic";
pub(crate) const BODY: &str = "I'd like to be notified when Masaic launches.";

/// Something that can take a `mailto:` link off our hands.
pub(crate) trait MailHandler {
    fn open(&mut self, link: &Url) -> Result<()>;
}

/// Hands the link to the desktop's URL opener and returns immediately.
pub(crate) struct SystemMailer;

impl MailHandler for SystemMailer {
    fn open(&mut self, link: &Url) -> Result<()> {
        spawn_detached(opener_command(link.as_str()))?;
        Ok(())
    }
}

/// Starts `cmd` with no stdio and reaps it on a background thread so the
/// caller never blocks and no zombie is left behind.
fn spawn_detached(mut cmd: Command) -> Result<JoinHandle<io::Result<ExitStatus>>> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    let mut child = cmd
        .spawn()
        .with_context(|| format!("could not launch {:?}", cmd.get_program()))?;
    Ok(thread::spawn(move || {
        let status = child.wait();
        if let Ok(s) = &status {
            log::debug!("mail opener exited with {s}");
        }
        status
    }))
}

fn opener_command(link: &str) -> Command {
    if cfg!(target_os = "macos") {
        let mut c = Command::new("open");
        c.arg(link);
        c
    } else if cfg!(target_os = "windows") {
        let mut c = Command::new("cmd");
        c.args(["/C", "start", ""]).arg(link);
        c
    } else {
        let mut c = Command::new("xdg-open");
        c.arg(link);
        c
    }
}

fn encode(s: &str) -> String {
    // mail clients disagree on '+', spaces go out as %20
    url::form_urlencoded::byte_serialize(s.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

pub(crate) fn compose(to: &str, subject: &str, body: &str) -> Result<Url> {
    let mut link = Url::parse(&format!("mailto:{to}"))
        .with_context(|| format!("bad mail recipient {to:?}"))?;
    link.set_query(Some(&format!(
        "subject={}&body={}",
        encode(subject),
        encode(body)
    )));
    Ok(link)
}

/// The "Notify me" draft.
pub(crate) fn notify_link() -> Result<Url> {
    compose(RECIPIENT, SUBJECT, BODY)
}
