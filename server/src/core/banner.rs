//! Startup banner and URL display

use super::config::is_all_interfaces;
use super::constants::APP_NAME;

/// Print the startup banner with URLs
pub fn print_banner(host: &str, port: u16, knowledge_tools: usize) {
    // Use localhost for display when binding to all interfaces
    let display_host = if is_all_interfaces(host) {
        "localhost"
    } else {
        host
    };
    let base = format!("http://{}:{}", display_host, port);

    println!();
    println!(
        "  \x1b[1m\x1b[36m{}\x1b[0m \x1b[90mv{}\x1b[0m",
        APP_NAME,
        env!("CARGO_PKG_VERSION")
    );
    println!();

    // Label width: "Ingest (POST):" is 14 chars, pad to 16 for alignment
    const W: usize = 16;

    println!(
        "  \x1b[32m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m {}",
        "Graph:",
        terminal_link(&format!("{}/api/v1/graph", base))
    );
    println!(
        "  \x1b[32m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m {}",
        "Live stream:",
        terminal_link(&format!("{}/api/v1/sse", base))
    );
    println!(
        "  \x1b[33m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m {}/api/v1/events",
        "Ingest (POST):", base
    );

    if host == "127.0.0.1" || host == "localhost" {
        println!(
            "  \x1b[90m➜  {:<W$} use --host 0.0.0.0 to expose\x1b[0m",
            "Network:"
        );
    } else if is_all_interfaces(host)
        && let Ok(interfaces) = local_ip_address::list_afinet_netifas()
    {
        for (_, ip) in interfaces
            .iter()
            .filter(|(_, ip)| ip.is_ipv4() && !ip.is_loopback())
        {
            let network_url = format!("http://{}:{}", ip, port);
            println!(
                "  \x1b[32m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m {}",
                "Network:",
                terminal_link(&network_url)
            );
        }
    } else if !is_all_interfaces(host) {
        let network_url = format!("http://{}:{}", host, port);
        println!(
            "  \x1b[32m➜\x1b[0m  \x1b[1m{:<W$}\x1b[0m {}",
            "Network:",
            terminal_link(&network_url)
        );
    }
    println!(
        "  \x1b[90m➜  {:<W$} {} tools documented\x1b[0m",
        "Knowledge:", knowledge_tools
    );

    println!();
}

/// Format a URL as a clickable OSC 8 hyperlink when the terminal supports it.
fn terminal_link(url: &str) -> String {
    if supports_hyperlinks::on(supports_hyperlinks::Stream::Stdout) {
        format!("\x1b]8;;{}\x07\x1b[36m{}\x1b[0m\x1b]8;;\x07", url, url)
    } else {
        format!("\x1b[36m{}\x1b[0m", url)
    }
}
