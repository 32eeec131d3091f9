//! Debug link registration and dispatch
//!
//! Links are selected with a string of the form `name` or
//! `name:key=value,key=value`. Which backends exist depends on the
//! features the binary was built with.

use multiflash_core::link::{DebugLink, LinkInfo};

/// Information about all links enabled at compile time
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_links() -> Vec<LinkInfo> {
    let mut links = Vec::new();

    #[cfg(feature = "dummy")]
    links.push(LinkInfo {
        name: "dummy",
        aliases: &["sim"],
        description: "Simulated SAMD21 target (device=<name|hex>,flash_kib=<n>,start=<hex>,locked,stuck)",
    });

    links
}

/// Help text listing every available link
pub fn link_help() -> String {
    let links = available_links();

    if links.is_empty() {
        return "No debug links available (recompile with link features enabled)".to_string();
    }

    let mut help = String::from("Available links:\n");
    for l in &links {
        help.push_str(&format!("  {:8} - {}\n", l.name, l.description));
    }
    help
}

/// Comma-separated link names for CLI help
pub fn link_names_short() -> String {
    available_links()
        .iter()
        .map(|l| l.name)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Resolve a link name or alias to its canonical name
pub fn find_link(name: &str) -> Option<&'static str> {
    available_links()
        .into_iter()
        .find(|l| l.name == name || l.aliases.contains(&name))
        .map(|l| l.name)
}

/// Split a link string into name and options
///
/// A bare key (`locked`) is read as `locked=true`.
pub fn parse_link_string(s: &str) -> (&str, Vec<(&str, &str)>) {
    match s.split_once(':') {
        Some((name, opts)) => {
            let options = opts
                .split(',')
                .filter(|opt| !opt.is_empty())
                .map(|opt| opt.split_once('=').unwrap_or((opt, "true")))
                .collect();
            (name, options)
        }
        None => (s, Vec::new()),
    }
}

/// Open the link named by `spec`
pub fn open_link(spec: &str) -> Result<Box<dyn DebugLink + Send>, Box<dyn std::error::Error>> {
    let (name, options) = parse_link_string(spec);

    let canonical = find_link(name).ok_or_else(|| unknown_link_error(name))?;

    match canonical {
        #[cfg(feature = "dummy")]
        "dummy" => {
            let config = multiflash_dummy::parse_options(&options)
                .map_err(|e| format!("Invalid dummy parameters: {}", e))?;
            log::info!("Opening simulated target...");
            Ok(Box::new(multiflash_dummy::DummyTarget::new(config)))
        }

        _ => {
            let _ = options;
            Err(unknown_link_error(name))
        }
    }
}

fn unknown_link_error(name: &str) -> Box<dyn std::error::Error> {
    let mut msg = format!("Unknown link: {}\n\n", name);
    msg.push_str(&link_help());
    msg.push_str("\nUse 'multiflash list-links' for more details");
    msg.into()
}
