//! Line-based prompt on the controlling terminal

use fwprompt_core::{
    Action, DurationOption, PresentationAdapter, Prompt, PromptEvent, PromptView, Selection,
    SessionHandle, SessionState,
};
use std::io::BufRead;

/// Presents prompts on stderr and reads answers from stdin
pub struct TerminalAdapter;

impl PresentationAdapter for TerminalAdapter {
    fn present(&self, prompt: Prompt) {
        let Prompt {
            view,
            selection,
            mut events,
            handle,
        } = prompt;

        render(&view, &selection);

        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match event {
                    PromptEvent::Tick { remaining, action } => {
                        eprintln!("{} ({})", button(action), remaining);
                    }
                    PromptEvent::Resolved { timed_out } => {
                        if timed_out {
                            eprintln!("Timed out");
                        }
                        break;
                    }
                }
            }
        });

        // Stdin reads block, keep them off the runtime
        std::thread::spawn(move || read_commands(&handle, &view));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Allow,
    Deny,
    Target(usize),
    Duration(usize),
    Advanced,
    ExtraIp(usize),
    ExtraPort,
    ExtraUser,
    Help,
}

impl Command {
    fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let word = words.next()?;
        let index = words.next().and_then(|w| w.parse::<usize>().ok());

        match (word, index) {
            ("a" | "allow", _) => Some(Command::Allow),
            ("d" | "deny", _) => Some(Command::Deny),
            ("t" | "target", Some(i)) => Some(Command::Target(i)),
            ("for" | "duration", Some(i)) => Some(Command::Duration(i)),
            ("adv" | "advanced", _) => Some(Command::Advanced),
            ("ip", Some(i)) => Some(Command::ExtraIp(i)),
            ("port", _) => Some(Command::ExtraPort),
            ("user", _) => Some(Command::ExtraUser),
            ("?" | "help", _) => Some(Command::Help),
            (other, None) => other.parse().ok().map(Command::Target),
            _ => None,
        }
    }

    /// Apply a selection change; returns false for commands that do not edit
    fn apply(self, selection: &mut Selection) -> bool {
        match self {
            Command::Target(i) => selection.primary = i,
            Command::Duration(i) => match DurationOption::from_index(i) {
                Some(duration) => selection.duration = duration,
                None => return false,
            },
            Command::Advanced => selection.advanced = !selection.advanced,
            Command::ExtraIp(i) => {
                selection.extra_dst_ip = if selection.extra_dst_ip == Some(i) {
                    None
                } else {
                    Some(i)
                };
            }
            Command::ExtraPort => selection.extra_dst_port = !selection.extra_dst_port,
            Command::ExtraUser => selection.extra_user_id = !selection.extra_user_id,
            Command::Allow | Command::Deny | Command::Help => return false,
        }
        true
    }
}

fn read_commands(handle: &SessionHandle, view: &PromptView) {
    let stdin = std::io::stdin();

    for line in stdin.lock().lines() {
        let Ok(line) = line else {
            break;
        };
        if handle.state() != SessionState::Presenting {
            break;
        }

        let Some(command) = Command::parse(&line) else {
            eprintln!("Unknown command, type ? for help");
            continue;
        };

        let action = match command {
            Command::Allow => Some(Action::Allow),
            Command::Deny => Some(Action::Deny),
            _ => None,
        };
        if let Some(action) = action {
            if let Err(e) = handle.submit(action, handle.selection()) {
                eprintln!("{}", e);
            }
            break;
        }

        let mut selection = handle.selection();
        if !command.apply(&mut selection) {
            render(view, &handle.selection());
            continue;
        }
        match handle.select(selection) {
            Ok(()) => render(view, &handle.selection()),
            Err(e) => eprintln!("{}", e),
        }
    }
}

fn button(action: Action) -> &'static str {
    match action {
        Action::Allow => "Allow",
        Action::Deny => "Deny",
    }
}

fn render(view: &PromptView, selection: &Selection) {
    eprintln!();
    eprintln!("{}", view.message());
    if !view.connection.process_cwd.is_empty() {
        eprintln!("  launched from {}", view.connection.process_cwd);
    }
    eprintln!("  pid {}  uid {}", view.connection.process_id, view.connection.user_id);

    eprintln!("Match ('t N'):");
    for (i, candidate) in view.candidates.primary.iter().enumerate() {
        let marker = if i == selection.primary { '*' } else { ' ' };
        eprintln!(" {} {:2}) {}", marker, i, candidate.label);
    }

    eprintln!("Duration ('for N'):");
    for option in DurationOption::all() {
        let marker = if option == selection.duration { '*' } else { ' ' };
        eprintln!(" {} {:2}) {}", marker, option.index(), option.label());
    }

    if selection.advanced {
        eprintln!("Also match destination ('ip N'):");
        for (i, candidate) in view.candidates.destination.iter().enumerate() {
            let marker = if selection.extra_dst_ip == Some(i) { '*' } else { ' ' };
            eprintln!(" {} {:2}) {}", marker, i, candidate.label);
        }
        eprintln!(
            "  [{}] port ('port')  [{}] user ('user')",
            if selection.extra_dst_port { 'x' } else { ' ' },
            if selection.extra_user_id { 'x' } else { ' ' },
        );
    }

    eprintln!(
        "a) allow  d) deny  adv) advanced  [default: {} in {}s]",
        view.default_action, view.timeout
    );
}
