//! Writes a synthetic vulnerability scan export for trying out QeVR.
//!
//! Usage: `generate_sample [OUTPUT]` (default `sample_scan.csv`)

use anyhow::Result;

const SUBNETS: [&str; 4] = ["10.10.40", "172.16.5", "192.168.1", "203.0.113"];
const TITLES: [&str; 6] = [
    "Apache Log4j Remote Code Execution, JNDI lookup",
    "OpenSSL Heartbeat Information Disclosure",
    "Microsoft SMBv1 Remote Code Execution",
    "OpenSSH User Enumeration",
    "Remote Desktop Services Remote Code Execution",
    "jQuery Cross-Site Scripting",
];
const PORTS: [&str; 6] = ["443", "22", "445", "3389", "80", "8080"];

/// Deterministic splitmix64 stream, so the same seed gives the same file.
struct ScanRng(u64);

impl ScanRng {
    fn next_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }

    /// Uniform value in `0..n`.
    fn below(&mut self, n: usize) -> usize {
        (self.next_u64() % n as u64) as usize
    }

    fn pick<'a>(&mut self, items: &[&'a str]) -> &'a str {
        items[self.below(items.len())]
    }
}

fn main() -> Result<()> {
    let output = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "sample_scan.csv".to_string());
    let mut rng = ScanRng(42);

    // A fixed CVE catalogue so hosts share findings
    let cves: Vec<String> = (0..500)
        .map(|_| format!("CVE-{}-{:04}", 2014 + rng.below(11), 1000 + rng.below(40_000)))
        .collect();

    let hosts: Vec<(String, String)> = (0..200)
        .map(|i| {
            let subnet = rng.pick(&SUBNETS);
            (format!("{subnet}.{}", 1 + i % 254), format!("host{i:03}.corp.example"))
        })
        .collect();

    let mut writer = csv::Writer::from_path(&output)?;
    writer.write_record(["IP", "DNS", "QID", "Title", "Severity", "Port", "CVE ID"])?;

    let mut rows = 0usize;
    for (ip, dns) in &hosts {
        let findings = 1 + rng.below(40);
        for _ in 0..findings {
            let cve = &cves[rng.below(cves.len())];
            let qid = (10_000 + rng.below(90_000)).to_string();
            let severity = (1 + rng.below(5)).to_string();
            writer.write_record([
                ip.as_str(),
                dns.as_str(),
                qid.as_str(),
                rng.pick(&TITLES),
                severity.as_str(),
                rng.pick(&PORTS),
                cve.as_str(),
            ])?;
            rows += 1;
        }
    }
    writer.flush()?;

    println!("Wrote {rows} findings for {} hosts to {output}", hosts.len());
    Ok(())
}
