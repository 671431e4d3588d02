use std::f64::consts::PI;

use anyhow::{Context, Result};
use encoding_rs::SHIFT_JIS;

/// Seeded Gaussian noise (splitmix64 + Box-Muller), reproducible across runs.
struct Noise(u64);

impl Noise {
    fn uniform(&mut self) -> f64 {
        self.0 = self.0.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^= z >> 31;
        (z >> 11) as f64 / (1u64 << 53) as f64
    }

    fn sample(&mut self, std_dev: f64) -> f64 {
        let u1 = self.uniform().max(1e-15);
        let u2 = self.uniform();
        std_dev * (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }
}

const RECORD_LENGTH: usize = 2500;
const SAMPLE_INTERVAL: f64 = 4e-6;

/// Thirteen metadata lines, so the header lands on line 14.
fn preamble() -> Vec<String> {
    vec![
        "Model,TDS2024C".to_string(),
        "Firmware Version,FV:v24.26".to_string(),
        format!("Record Length,{RECORD_LENGTH}"),
        format!("Sample Interval,{SAMPLE_INTERVAL:e}"),
        "Trigger Point,1250".to_string(),
        "Source,CH1,CH2,CH3,CH4".to_string(),
        "Vertical Units,V,V,V,A".to_string(),
        "Vertical Scale,1.0,0.5,2.0,0.1".to_string(),
        "Horizontal Units,s".to_string(),
        "Horizontal Scale,0.001".to_string(),
        "測定者,山田".to_string(),
        "備考,サンプル波形".to_string(),
        "Probe Atten,10,10,10,1".to_string(),
    ]
}

fn main() -> Result<()> {
    let mut output = "sample_capture.csv".to_string();
    let mut fixed = false;
    for arg in std::env::args().skip(1) {
        if arg == "--fixed" {
            fixed = true;
        } else {
            output = arg;
        }
    }

    let mut noise = Noise(42);
    let mut text = preamble().join("\n");
    text.push('\n');
    text.push_str("TIME,CH1,CH2,CH3,CH4\n");
    if fixed {
        // Line 15: units row, skipped by the 14/16 fixed layout.
        text.push_str("単位,V,V,V,A\n");
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    for i in 0..RECORD_LENGTH {
        let t = (i as f64 - RECORD_LENGTH as f64 / 2.0) * SAMPLE_INTERVAL;
        let phase = 2.0 * PI * 1_000.0 * t;
        let sine = phase.sin() + noise.sample(0.02);
        let square = if phase.sin() >= 0.0 { 0.5 } else { -0.5 };
        let triangle = 2.0 / PI * phase.sin().asin() * 2.0;
        let current = 0.2 * (-t.abs() * 500.0).exp() + noise.sample(0.005);
        writer
            .write_record(
                [t, sine, square, triangle, current]
                    .iter()
                    .map(|v| format!("{v:.6e}")),
            )
            .context("formatting sample row")?;
    }
    let rows = writer
        .into_inner()
        .map_err(|e| e.into_error())
        .context("flushing sample rows")?;
    text.push_str(&String::from_utf8_lossy(&rows));

    let (encoded, _, unmappable) = SHIFT_JIS.encode(&text);
    if unmappable {
        anyhow::bail!("sample text is not representable in Shift-JIS");
    }
    std::fs::write(&output, &encoded).with_context(|| format!("writing {output}"))?;

    println!(
        "Wrote {RECORD_LENGTH} samples x 4 channels to {output} ({} layout)",
        if fixed { "fixed 14/16" } else { "marker" }
    );
    Ok(())
}
