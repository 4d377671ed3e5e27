use super::msp::MspReader;
use crate::errors::{
    LibraryReadingError,
    MsSeekError,
    Result,
};
use crate::models::{
    CasNumber,
    ReferenceRecord,
    SerSpectrum,
    Spectrum,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::io::{
    BufRead,
    BufReader,
    Read,
    Write,
};
use std::path::{
    Path,
    PathBuf,
};
use tracing::debug;

/// One library entry as stored in NDJSON and MessagePack files.
///
/// Only `name` and `mass_spec` are required. `spec_loc` and `lib_idx` are not
/// stored, they are assigned when the library is loaded.
///
/// Peaks are validated when converting into a [`ReferenceRecord`], not while
/// decoding, so an entry with bad peaks does not desynchronize a stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerReferenceEntry {
    name: String,
    #[serde(default)]
    cas: Option<String>,
    #[serde(default)]
    formula: String,
    #[serde(default)]
    contributor: String,
    #[serde(default)]
    nist_no: u32,
    #[serde(default)]
    id: String,
    #[serde(default)]
    mw: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exact_mass: Option<f64>,
    #[serde(default)]
    synonyms: Vec<String>,
    mass_spec: SerSpectrum,
}

impl SerReferenceEntry {
    pub fn sample() -> Self {
        (&ReferenceRecord::sample()).into()
    }
}

impl TryFrom<SerReferenceEntry> for ReferenceRecord {
    type Error = LibraryReadingError;

    fn try_from(x: SerReferenceEntry) -> std::result::Result<Self, Self::Error> {
        let mass_spec =
            Spectrum::try_from(x.mass_spec).map_err(|e| LibraryReadingError::InvalidEntry {
                name: x.name.clone(),
                context: e.to_string(),
            })?;
        let cas = match x.cas.as_deref() {
            Some(cas) => CasNumber::parse(cas).unwrap_or_else(|e| {
                debug!("{} for '{}', storing unknown CAS", e, x.name);
                CasNumber::Unknown
            }),
            None => CasNumber::Unknown,
        };
        let mw = x.mw.max(0.0).round() as u32;
        let mut record = ReferenceRecord::new(x.name, cas, mw, mass_spec);
        record.formula = x.formula;
        record.contributor = x.contributor;
        record.nist_no = x.nist_no;
        record.id = x.id;
        record.synonyms = x.synonyms;
        if let Some(exact_mass) = x.exact_mass.filter(|m| *m > 0.0) {
            record.exact_mass = exact_mass;
        }
        Ok(record)
    }
}

impl From<&ReferenceRecord> for SerReferenceEntry {
    fn from(x: &ReferenceRecord) -> Self {
        SerReferenceEntry {
            name: x.name.clone(),
            cas: Some(x.cas.to_string()),
            formula: x.formula.clone(),
            contributor: x.contributor.clone(),
            nist_no: x.nist_no,
            id: x.id.clone(),
            mw: x.mw as f64,
            exact_mass: Some(x.exact_mass),
            synonyms: x.synonyms.clone(),
            mass_spec: x.mass_spec.clone().into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryFormat {
    NdJson,
    NdJsonZstd,
    MessagePack,
    MessagePackZstd,
    Msp,
}

impl LibraryFormat {
    pub fn detect_from_path(path: &Path) -> std::result::Result<Self, LibraryReadingError> {
        let path_str = path.to_string_lossy().to_lowercase();

        if path_str.ends_with(".msgpack.zst") {
            Ok(LibraryFormat::MessagePackZstd)
        } else if path_str.ends_with(".msgpack") {
            Ok(LibraryFormat::MessagePack)
        } else if path_str.ends_with(".ndjson.zst") {
            Ok(LibraryFormat::NdJsonZstd)
        } else if path_str.ends_with(".ndjson") {
            Ok(LibraryFormat::NdJson)
        } else if path_str.ends_with(".msp") {
            Ok(LibraryFormat::Msp)
        } else {
            Self::detect_from_content(path)
        }
    }

    fn detect_from_content(path: &Path) -> std::result::Result<Self, LibraryReadingError> {
        let file =
            std::fs::File::open(path).map_err(|e| LibraryReadingError::FileReadingError {
                source: e,
                context: "Error opening file for format detection",
                path: PathBuf::from(path),
            })?;

        let mut reader = BufReader::new(file);
        let mut buffer = [0u8; 8];

        match reader.read(&mut buffer) {
            Ok(bytes_read) if bytes_read >= 4 => {
                let start = buffer
                    .iter()
                    .position(|b| !b.is_ascii_whitespace())
                    .unwrap_or(0);
                if buffer[0..4] == ZSTD_MAGIC {
                    Self::detect_zstd_payload(path)
                } else if buffer[start] == b'{' {
                    Ok(LibraryFormat::NdJson)
                } else if buffer[start..].to_ascii_lowercase().starts_with(b"name") {
                    Ok(LibraryFormat::Msp)
                } else {
                    Ok(LibraryFormat::MessagePack)
                }
            }
            _ => Ok(LibraryFormat::NdJson),
        }
    }

    /// Looks at the first decompressed byte: NDJSON starts with `{`, anything
    /// else is taken as MessagePack.
    fn detect_zstd_payload(path: &Path) -> std::result::Result<Self, LibraryReadingError> {
        let file =
            std::fs::File::open(path).map_err(|e| LibraryReadingError::FileReadingError {
                source: e,
                context: "Error opening file for format detection",
                path: PathBuf::from(path),
            })?;
        let mut decoder = zstd::Decoder::new(file).map_err(zstd_error)?;
        let mut buffer = [0u8; 64];
        let bytes_read = decoder.read(&mut buffer).map_err(zstd_error)?;
        let first = buffer[..bytes_read]
            .iter()
            .find(|b| !b.is_ascii_whitespace());
        match first {
            Some(b'{') => Ok(LibraryFormat::NdJsonZstd),
            _ => Ok(LibraryFormat::MessagePackZstd),
        }
    }
}

const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// Streams reference records out of any supported library format.
pub struct LibraryReader<'a> {
    inner: Box<
        dyn Iterator<Item = std::result::Result<ReferenceRecord, LibraryReadingError>> + Send + 'a,
    >,
}

fn zstd_error(e: std::io::Error) -> LibraryReadingError {
    LibraryReadingError::SpeclibParsingError {
        source: serde_json::Error::io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
        context: "Error creating ZSTD decoder",
    }
}

impl<'a> LibraryReader<'a> {
    pub fn new<R: Read + Send + 'a>(
        reader: R,
        format: LibraryFormat,
    ) -> std::result::Result<Self, LibraryReadingError> {
        let inner: Box<
            dyn Iterator<Item = std::result::Result<ReferenceRecord, LibraryReadingError>>
                + Send
                + 'a,
        > = match format {
            LibraryFormat::NdJson => Box::new(NdJsonReader::new(BufReader::new(reader))),
            LibraryFormat::NdJsonZstd => {
                let decoder = zstd::Decoder::new(reader).map_err(zstd_error)?;
                Box::new(NdJsonReader::new(BufReader::new(decoder)))
            }
            LibraryFormat::MessagePack => Box::new(MessagePackReader::new(reader)),
            LibraryFormat::MessagePackZstd => {
                let decoder = zstd::Decoder::new(reader).map_err(zstd_error)?;
                Box::new(MessagePackReader::new(decoder))
            }
            LibraryFormat::Msp => Box::new(MspReader::new(BufReader::new(reader))),
        };

        Ok(LibraryReader { inner })
    }
}

impl Iterator for LibraryReader<'_> {
    type Item = std::result::Result<ReferenceRecord, LibraryReadingError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}

struct NdJsonReader<R: BufRead> {
    reader: R,
}

impl<R: BufRead> NdJsonReader<R> {
    fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead> Iterator for NdJsonReader<R> {
    type Item = std::result::Result<ReferenceRecord, LibraryReadingError>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut line = String::new();
        loop {
            line.clear();
            match self.reader.read_line(&mut line) {
                Ok(0) => return None,
                Ok(_) if line.trim().is_empty() => continue,
                Ok(_) => {
                    return Some(
                        serde_json::from_str::<SerReferenceEntry>(&line)
                            .map_err(|e| LibraryReadingError::SpeclibParsingError {
                                source: e,
                                context: "Error parsing NDJSON line",
                            })
                            .and_then(ReferenceRecord::try_from),
                    );
                }
                Err(e) => {
                    return Some(Err(LibraryReadingError::FileReadingError {
                        source: e,
                        context: "Error reading line",
                        path: PathBuf::new(),
                    }));
                }
            }
        }
    }
}

struct MessagePackReader<R: Read> {
    deserializer: rmp_serde::Deserializer<rmp_serde::decode::ReadReader<R>>,
    done: bool,
}

impl<R: Read> MessagePackReader<R> {
    fn new(reader: R) -> Self {
        Self {
            deserializer: rmp_serde::Deserializer::new(reader),
            done: false,
        }
    }
}

impl<R: Read> Iterator for MessagePackReader<R> {
    type Item = std::result::Result<ReferenceRecord, LibraryReadingError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match SerReferenceEntry::deserialize(&mut self.deserializer) {
            Ok(elem) => Some(ReferenceRecord::try_from(elem)),
            Err(rmp_serde::decode::Error::InvalidMarkerRead(ref io_err))
                if io_err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                None
            }
            Err(rmp_serde::decode::Error::InvalidDataRead(ref io_err))
                if io_err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                None
            }
            Err(e) => {
                // The stream position is unknown after a failed byte-level decode.
                self.done = true;
                Some(Err(LibraryReadingError::SpeclibParsingError {
                    source: serde_json::Error::io(std::io::Error::new(
                        std::io::ErrorKind::InvalidData,
                        e,
                    )),
                    context: "Error reading MessagePack",
                }))
            }
        }
    }
}

/// Opens a library file, detecting its format, and streams its entries.
///
/// Only failing to open the file is an error here; entries that fail to
/// parse come out of the iterator as `Err` so the caller can skip them.
pub fn read_library_file(
    path: &Path,
) -> Result<impl Iterator<Item = Result<ReferenceRecord>> + Send + 'static> {
    let format = LibraryFormat::detect_from_path(path)?;
    read_library_file_with_format(path, format)
}

pub fn read_library_file_with_format(
    path: &Path,
    format: LibraryFormat,
) -> Result<impl Iterator<Item = Result<ReferenceRecord>> + Send + 'static> {
    let file = std::fs::File::open(path).map_err(|e| LibraryReadingError::FileReadingError {
        source: e,
        context: "Error opening library file",
        path: PathBuf::from(path),
    })?;
    debug!("Reading {} as {:?}", path.display(), format);
    let reader = LibraryReader::new(file, format)?;
    Ok(reader.map(|entry| entry.map_err(MsSeekError::from)))
}

/// Writes records in the given format.
///
/// MessagePack entries are written as maps so optional fields can be left out
/// by other producers.
pub fn write_library<W: Write>(
    writer: W,
    records: &[ReferenceRecord],
    format: LibraryFormat,
) -> Result<()> {
    match format {
        LibraryFormat::NdJson => write_ndjson(writer, records),
        LibraryFormat::NdJsonZstd => {
            let encoder = zstd::Encoder::new(writer, 0)?.auto_finish();
            write_ndjson(encoder, records)
        }
        LibraryFormat::MessagePack => write_msgpack(writer, records),
        LibraryFormat::MessagePackZstd => {
            let encoder = zstd::Encoder::new(writer, 0)?.auto_finish();
            write_msgpack(encoder, records)
        }
        LibraryFormat::Msp => {
            let mut writer = writer;
            for record in records {
                writeln!(writer, "{}", record.to_msp()?)?;
            }
            writer.flush()?;
            Ok(())
        }
    }
}

fn write_ndjson<W: Write>(mut writer: W, records: &[ReferenceRecord]) -> Result<()> {
    for record in records {
        serde_json::to_writer(&mut writer, &SerReferenceEntry::from(record))?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

fn write_msgpack<W: Write>(mut writer: W, records: &[ReferenceRecord]) -> Result<()> {
    for record in records {
        rmp_serde::encode::write_named(&mut writer, &SerReferenceEntry::from(record)).map_err(
            |e| MsSeekError::ParseError {
                msg: format!("Error writing MessagePack: {}", e),
            },
        )?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes records to `path`, picking the format from the extension.
///
/// Unknown extensions are written as NDJSON.
pub fn write_library_file(path: &Path, records: &[ReferenceRecord]) -> Result<()> {
    let format = match LibraryFormat::detect_from_path(path) {
        Ok(format) => format,
        Err(_) => LibraryFormat::NdJson,
    };
    let file = std::fs::File::create(path).map_err(|e| MsSeekError::Io {
        source: e,
        path: Some(path.to_path_buf()),
    })?;
    write_library(std::io::BufWriter::new(file), records, format)
}
