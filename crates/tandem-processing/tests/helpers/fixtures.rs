use std::path::Path;
use std::time::Duration;

use image::{DynamicImage, Rgba, RgbaImage};
use tandem_processing::image::ImageEncoder;
use tandem_processing::{Probe, ToolCommand};

fn sh(script: String) -> ToolCommand {
    ToolCommand::new("sh").args(["-c".to_string(), script])
}

/// Probe that prints an ffprobe-style duration line to stderr.
pub fn fake_probe(duration: &str) -> Probe {
    Probe::new(
        sh(format!(
            "echo '  Duration: {}, start: 0.000000, bitrate: 1 kb/s' >&2",
            duration
        )),
        Duration::from_secs(5),
    )
}

/// Encoder that records its run and copies stdin to stdout.
pub fn logging_encoder(name: &str, log: &Path) -> ToolCommand {
    sh(format!("echo {} >> '{}'; exec cat", name, log.display()))
}

pub fn failing_encoder() -> ToolCommand {
    sh("cat > /dev/null; echo 'Conversion failed!' >&2; exit 1".to_string())
}

/// Never reads its input and never exits on its own.
pub fn stalled_encoder() -> ToolCommand {
    sh("exec sleep 30".to_string())
}

/// Emits some output, then hangs without reading its input.
pub fn hanging_encoder() -> ToolCommand {
    sh("head -c 4096 /dev/zero; exec sleep 30".to_string())
}

pub fn frame_command(png: &Path) -> ToolCommand {
    ToolCommand::new("cat").arg(png.display().to_string())
}

pub fn gradient(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
    }))
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    ImageEncoder::png(&gradient(width, height)).unwrap().to_vec()
}

pub fn write_png(path: &Path, width: u32, height: u32) {
    std::fs::write(path, png_bytes(width, height)).unwrap();
}

/// Deterministic stand-in for an uploaded clip.
pub fn clip_bytes(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
