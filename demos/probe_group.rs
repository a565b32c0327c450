use clap::Parser;
use ipnet::Ipv4Net;
use routeros_reach::{DeviceDescriptorBuilder, Prober, ProberConfigBuilder};
use std::io::Write;
use std::time::{Duration, Instant};

/// Simple example to show group probing through a RouterOS router
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Router address
    #[arg(long)]
    host: String,
    /// API port, falls back to 8728
    #[arg(long, default_value = "8728")]
    port: String,
    #[arg(short, long)]
    user: String,
    #[arg(short, long, default_value = "")]
    password: String,
    /// Subnet whose hosts are probed, e.g. 192.168.88.0/24
    #[arg(long)]
    net: Option<Ipv4Net>,
    /// Individual addresses to probe
    targets: Vec<String>,
    /// Pings in flight at once
    #[arg(long, default_value_t = 1)]
    concurrency: usize,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();
    let descriptor = DeviceDescriptorBuilder::new(&args.host)
        .with_port_str(&args.port)
        .with_credentials(&args.user, &args.password)
        .build()
        .unwrap();

    let mut targets = args.targets;
    if let Some(net) = args.net {
        targets.extend(net.hosts().map(|ip| ip.to_string()));
    }

    let prober = Prober::new(
        ProberConfigBuilder::new()
            .with_probe_timeout(Duration::from_millis(1500))
            .with_probe_concurrency(args.concurrency)
            .build(),
    );

    let start = Instant::now();
    let report = prober.probe_group(&descriptor, &targets).await;
    let scan_duration = start.elapsed();

    {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", serde_json::to_string_pretty(&report).unwrap()).unwrap();
        writeln!(stdout, "Scan took {:?}", scan_duration).unwrap();
    }
}
