//! QR-code export of client configuration files
use crate::error::{Error, Result};
use crate::ini::write_private_file;
use image::{ImageFormat, Luma};
use qrcode::render::unicode::Dense1x2;
use qrcode::{EcLevel, QrCode};
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;
use tracing::{info, warn};

/// Largest part of a configuration file embedded in a QR code
pub const RAW_CONFIG_MAX_LENGTH: usize = 2048;

/// Minimal width and height of exported images, quiet zone included
pub const IMAGE_SIZE: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    /// Block characters, two modules per line
    Txt,
    Png,
    #[value(alias = "jpeg")]
    Jpg,
}

impl ExportFormat {
    /// Format implied by a file extension, text when unknown
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "png" => ExportFormat::Png,
            "jpg" | "jpeg" => ExportFormat::Jpg,
            _ => ExportFormat::Txt,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Txt => "txt",
            ExportFormat::Png => "png",
            ExportFormat::Jpg => "jpg",
        }
    }
}

/// Encode raw bytes with low error correction, truncating oversized input
pub fn encode(data: &[u8]) -> Result<QrCode> {
    let data = if data.len() > RAW_CONFIG_MAX_LENGTH {
        warn!(
            "Configuration is {} bytes long, only the first {} are exported",
            data.len(),
            RAW_CONFIG_MAX_LENGTH
        );
        &data[..RAW_CONFIG_MAX_LENGTH]
    } else {
        data
    };
    Ok(QrCode::with_error_correction_level(data, EcLevel::L)?)
}

/// Read (at most [`RAW_CONFIG_MAX_LENGTH`] bytes of) a file and encode it
pub fn encode_file(path: &Path) -> Result<QrCode> {
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let mut data = Vec::new();
    file.take(RAW_CONFIG_MAX_LENGTH as u64 + 1)
        .read_to_end(&mut data)
        .map_err(|e| Error::io(path, e))?;
    encode(&data)
}

/// Render for a terminal with light modules drawn, which reads correctly on
/// dark backgrounds
pub fn render_text(code: &QrCode) -> String {
    code.render::<Dense1x2>()
        .dark_color(Dense1x2::Light)
        .light_color(Dense1x2::Dark)
        .build()
}

fn render_image(code: &QrCode, format: ImageFormat) -> Result<Vec<u8>> {
    let image = code
        .render::<Luma<u8>>()
        .min_dimensions(IMAGE_SIZE, IMAGE_SIZE)
        .build();
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, format)?;
    Ok(buf.into_inner())
}

/// Write a QR code to `output` in the given format, readable by the owner only
pub fn save(code: &QrCode, output: &Path, format: ExportFormat) -> Result<()> {
    let bytes = match format {
        ExportFormat::Txt => render_text(code).into_bytes(),
        ExportFormat::Png => render_image(code, ImageFormat::Png)?,
        ExportFormat::Jpg => render_image(code, ImageFormat::Jpeg)?,
    };
    write_private_file(output, &bytes)?;
    info!("Exported QR code to {}", output.display());
    Ok(())
}

/// Export the configuration file `input` to `output`, choosing the format
/// from the output's extension
pub fn export_config(input: &Path, output: &Path) -> Result<()> {
    let code = encode_file(input)?;
    save(&code, output, ExportFormat::from_path(output))
}
