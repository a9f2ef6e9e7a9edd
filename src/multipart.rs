use std::collections::BTreeMap;
use std::fmt;
use std::io::{self, Read};
use std::path::Path;
use std::sync::OnceLock;

use url::form_urlencoded;

const CRLF: &[u8] = b"\r\n";

/// MIME type used when the file name says nothing useful
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Structured request body: field name to value
///
/// Keys iterate in sorted order, which fixes the order fields appear in both
/// the URL-encoded and the multipart encodings.
pub type Fields = BTreeMap<String, FieldValue>;

/// Value of a single form field
pub enum FieldValue {
    /// Scalar value, already in textual form
    Text(String),
    /// Repeated field, one entry per element
    List(Vec<FieldValue>),
    /// File-like stream, uploaded as a file part
    File(FileField),
}

impl FieldValue {
    /// Build a text value from raw bytes, decoding them as UTF-8
    pub fn bytes(bytes: &[u8]) -> Self {
        FieldValue::Text(to_text(bytes))
    }

    /// Build a repeated field from anything convertible to field values
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<FieldValue>,
    {
        FieldValue::List(items.into_iter().map(Into::into).collect())
    }
}

impl fmt::Debug for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(text) => write!(f, "Text({:?})", text),
            FieldValue::List(items) => f.debug_tuple("List").field(items).finish(),
            FieldValue::File(file) => write!(f, "File({:?})", file.name()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<FileField> for FieldValue {
    fn from(file: FileField) -> Self {
        FieldValue::File(file)
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(items: Vec<T>) -> Self {
        FieldValue::list(items)
    }
}

macro_rules! scalar_field {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for FieldValue {
                fn from(value: $ty) -> Self {
                    FieldValue::Text(value.to_string())
                }
            }
        )*
    };
}

scalar_field!(i32, i64, u32, u64, usize, f32, f64, bool, char);

/// A readable stream uploaded as a file part
///
/// `name` is path-like: its last `/`-separated component becomes the
/// filename and its extension drives the MIME type.
pub struct FileField {
    name: String,
    reader: Box<dyn Read + Send>,
}

impl FileField {
    /// Wrap any reader under the given name
    pub fn from_reader<R>(name: impl Into<String>, reader: R) -> Self
    where
        R: Read + Send + 'static,
    {
        Self {
            name: name.into(),
            reader: Box::new(reader),
        }
    }

    /// In-memory file content
    pub fn from_bytes(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self::from_reader(name, io::Cursor::new(content.into()))
    }

    /// Open a file on disk; the path becomes the field's name
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        Ok(Self::from_reader(path.to_string_lossy().into_owned(), file))
    }

    /// The path-like name of the stream
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last component of the name, as sent in `filename="..."`
    pub fn file_name(&self) -> &str {
        basename(&self.name)
    }

    /// Read the whole remaining content
    pub fn read(&mut self) -> io::Result<Vec<u8>> {
        let mut content = Vec::new();
        self.reader.read_to_end(&mut content)?;
        Ok(content)
    }
}

impl fmt::Debug for FileField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileField").field("name", &self.name).finish()
    }
}

/// Process-wide multipart boundary, generated on first use
pub fn boundary() -> &'static str {
    static BOUNDARY: OnceLock<String> = OnceLock::new();
    BOUNDARY.get_or_init(generate_boundary)
}

/// Generate a random boundary for multipart forms
pub fn generate_boundary() -> String {
    use rand::Rng;
    let mut rng = rand::thread_rng();
    let bytes: [u8; 16] = rng.gen();
    hex::encode(bytes)
}

/// Whether a value is uploaded as a file
pub fn is_file_like(value: &FieldValue) -> bool {
    matches!(value, FieldValue::File(_))
}

/// Whether any field, including list elements, is a file
pub fn has_file(fields: &Fields) -> bool {
    expand_fields(fields).iter().any(|(_, value)| is_file_like(value))
}

/// Flatten a field mapping into `(name, value)` pairs
///
/// Lists yield one pair per element in list order. The returned values are
/// never `FieldValue::List`.
pub fn expand_fields(fields: &Fields) -> Vec<(&str, &FieldValue)> {
    fn push<'a>(out: &mut Vec<(&'a str, &'a FieldValue)>, name: &'a str, value: &'a FieldValue) {
        match value {
            FieldValue::List(items) => items.iter().for_each(|item| push(out, name, item)),
            other => out.push((name, other)),
        }
    }

    let mut pairs = Vec::with_capacity(fields.len());
    for (name, value) in fields {
        push(&mut pairs, name, value);
    }
    pairs
}

fn expand_owned(fields: Fields) -> Vec<(String, FieldValue)> {
    fn push(out: &mut Vec<(String, FieldValue)>, name: &str, value: FieldValue) {
        match value {
            FieldValue::List(items) => items.into_iter().for_each(|item| push(out, name, item)),
            other => out.push((name.to_string(), other)),
        }
    }

    let mut pairs = Vec::with_capacity(fields.len());
    for (name, value) in fields {
        push(&mut pairs, &name, value);
    }
    pairs
}

/// Decode bytes as UTF-8, replacing invalid sequences
pub fn to_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Guess the MIME type of a path from its extension
pub fn guess_mime(path: &str) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or(OCTET_STREAM)
        .to_string()
}

/// Lines of a file part; the last line is the raw file content
pub fn encode_file_part(boundary: &str, name: &str, file: &mut FileField) -> io::Result<Vec<Vec<u8>>> {
    let content = file.read()?;
    Ok(vec![
        format!("--{}", boundary).into_bytes(),
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"",
            name,
            file.file_name()
        )
        .into_bytes(),
        format!("Content-Type: {}", guess_mime(file.name())).into_bytes(),
        Vec::new(),
        content,
    ])
}

/// Lines of a plain field part
pub fn encode_scalar_part(boundary: &str, name: &str, value: &str) -> Vec<Vec<u8>> {
    vec![
        format!("--{}", boundary).into_bytes(),
        format!("Content-Disposition: form-data; name=\"{}\"", name).into_bytes(),
        Vec::new(),
        value.as_bytes().to_vec(),
    ]
}

/// Encode fields as a `multipart/form-data` body
///
/// Names and values are written as-is: quotes are not escaped and the
/// content is not checked for the boundary.
pub fn encode_multipart(boundary: &str, fields: Fields) -> io::Result<Vec<u8>> {
    let mut lines = Vec::new();

    for (name, value) in expand_owned(fields) {
        match value {
            FieldValue::File(mut file) => lines.extend(encode_file_part(boundary, &name, &mut file)?),
            FieldValue::Text(text) => lines.extend(encode_scalar_part(boundary, &name, &text)),
            FieldValue::List(_) => unreachable!("lists are flattened by expand_owned"),
        }
    }

    lines.push(format!("--{}--", boundary).into_bytes());
    lines.push(Vec::new());
    Ok(lines.join(CRLF))
}

/// Encode fields as `application/x-www-form-urlencoded`
///
/// A file field contributes its name; the client never routes files here.
pub fn url_encode(fields: &Fields) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (name, value) in expand_fields(fields) {
        match value {
            FieldValue::Text(text) => serializer.append_pair(name, text),
            FieldValue::File(file) => serializer.append_pair(name, file.name()),
            FieldValue::List(_) => unreachable!("lists are flattened by expand_fields"),
        };
    }
    serializer.finish()
}
