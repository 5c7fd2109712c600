//! The stream registry: opaque handles over stdio, files and in-memory
//! buffers.
//!
//! Each engine owns one registry. Readers take the read lock
//! (`current_input`, alias resolution); open/close take the write lock.
//! The engine's shutdown force-closes every non-standard stream, logging
//! failures instead of throwing.

use std::collections::{HashMap, VecDeque};
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Cursor, Read, Seek, SeekFrom, Write};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, RwLock};

use crate::error::{domain_error, existence_error, instantiation_error, permission_error, Ball};
use crate::term::{OpaqueRef, OpaqueValue, Term};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    Read,
    Write,
    Append,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamType {
    Text,
    Binary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EofAction {
    Error,
    EofCode,
    Reset,
}

#[derive(Debug, Clone)]
pub struct StreamOptions {
    pub stream_type: StreamType,
    pub reposition: bool,
    pub alias: Option<String>,
    pub eof_action: EofAction,
}

impl Default for StreamOptions {
    fn default() -> Self {
        StreamOptions {
            stream_type: StreamType::Text,
            reposition: false,
            alias: None,
            eof_action: EofAction::EofCode,
        }
    }
}

#[derive(Debug)]
enum Backend {
    Stdin,
    Stdout,
    Stderr,
    FileIn(BufReader<File>),
    FileOut(BufWriter<File>),
    MemIn(Cursor<Vec<u8>>),
    MemOut(Vec<u8>),
    Closed,
}

#[derive(Debug)]
pub struct Stream {
    pub id: u64,
    pub name: String,
    pub mode: StreamMode,
    pub options: StreamOptions,
    backend: Backend,
    pushback: VecDeque<u8>,
    position: u64,
    eof_seen: bool,
}

impl Stream {
    pub fn is_input(&self) -> bool {
        self.mode == StreamMode::Read
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn at_eof(&mut self) -> io::Result<bool> {
        Ok(self.peek_byte_raw()?.is_none())
    }

    fn read_raw(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.backend {
            Backend::Stdin => io::stdin().read(buf),
            Backend::FileIn(r) => r.read(buf),
            Backend::MemIn(c) => c.read(buf),
            Backend::Closed => Err(io::Error::new(io::ErrorKind::Other, "stream closed")),
            _ => Err(io::Error::new(io::ErrorKind::Other, "not an input stream")),
        }
    }

    fn next_byte(&mut self) -> io::Result<Option<u8>> {
        if let Some(b) = self.pushback.pop_front() {
            self.position += 1;
            return Ok(Some(b));
        }
        let mut buf = [0u8; 1];
        match self.read_raw(&mut buf)? {
            0 => {
                self.eof_seen = true;
                Ok(None)
            }
            _ => {
                self.position += 1;
                Ok(Some(buf[0]))
            }
        }
    }

    fn unread(&mut self, bytes: &[u8]) {
        for b in bytes.iter().rev() {
            self.pushback.push_front(*b);
        }
        self.position -= bytes.len() as u64;
    }

    pub fn get_byte(&mut self) -> io::Result<Option<u8>> {
        self.next_byte()
    }

    fn peek_byte_raw(&mut self) -> io::Result<Option<u8>> {
        match self.next_byte()? {
            Some(b) => {
                self.unread(&[b]);
                Ok(Some(b))
            }
            None => Ok(None),
        }
    }

    pub fn peek_byte(&mut self) -> io::Result<Option<u8>> {
        self.peek_byte_raw()
    }

    /// Decode one UTF-8 character.
    pub fn get_char(&mut self) -> io::Result<Option<char>> {
        let first = match self.next_byte()? {
            Some(b) => b,
            None => return Ok(None),
        };
        let extra = match first {
            0x00..=0x7F => 0,
            0xC0..=0xDF => 1,
            0xE0..=0xEF => 2,
            0xF0..=0xF7 => 3,
            _ => return Ok(Some(char::REPLACEMENT_CHARACTER)),
        };
        let mut bytes = vec![first];
        for _ in 0..extra {
            match self.next_byte()? {
                Some(b) => bytes.push(b),
                None => break,
            }
        }
        match std::str::from_utf8(&bytes) {
            Ok(s) => Ok(s.chars().next()),
            Err(_) => Ok(Some(char::REPLACEMENT_CHARACTER)),
        }
    }

    pub fn peek_char(&mut self) -> io::Result<Option<char>> {
        let before = self.position;
        let c = self.get_char()?;
        if let Some(c) = c {
            let mut buf = [0u8; 4];
            let encoded = c.encode_utf8(&mut buf);
            self.unread(encoded.as_bytes());
            debug_assert_eq!(self.position, before);
        }
        Ok(c)
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        match &mut self.backend {
            Backend::Stdout => io::stdout().write_all(bytes)?,
            Backend::Stderr => io::stderr().write_all(bytes)?,
            Backend::FileOut(w) => w.write_all(bytes)?,
            Backend::MemOut(buf) => buf.extend_from_slice(bytes),
            Backend::Closed => {
                return Err(io::Error::new(io::ErrorKind::Other, "stream closed"))
            }
            _ => return Err(io::Error::new(io::ErrorKind::Other, "not an output stream")),
        }
        self.position += bytes.len() as u64;
        Ok(())
    }

    pub fn write_str(&mut self, s: &str) -> io::Result<()> {
        self.write_bytes(s.as_bytes())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        match &mut self.backend {
            Backend::Stdout => io::stdout().flush(),
            Backend::Stderr => io::stderr().flush(),
            Backend::FileOut(w) => w.flush(),
            _ => Ok(()),
        }
    }

    pub fn seek_to(&mut self, position: u64) -> io::Result<()> {
        self.pushback.clear();
        self.eof_seen = false;
        match &mut self.backend {
            Backend::FileIn(r) => {
                r.seek(SeekFrom::Start(position))?;
            }
            Backend::MemIn(c) => c.set_position(position),
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    "stream is not repositionable",
                ))
            }
        }
        self.position = position;
        Ok(())
    }

    /// Whether a previous read already reported end-of-file; drives the
    /// `eof_action(error)` discipline.
    pub fn eof_seen(&self) -> bool {
        self.eof_seen
    }

    /// For `eof_action(reset)`: forget the eof condition so the next read
    /// probes the backend again.
    pub fn clear_eof(&mut self) {
        self.eof_seen = false;
    }

    fn close_backend(&mut self) -> io::Result<()> {
        let result = self.flush();
        self.backend = Backend::Closed;
        result
    }
}

/// The opaque payload stored in stream terms.
struct StreamHandle {
    id: u64,
}

impl OpaqueValue for StreamHandle {
    fn tag(&self) -> &'static str {
        "stream"
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

pub struct StreamTable {
    streams: RwLock<HashMap<u64, Arc<Mutex<Stream>>>>,
    aliases: RwLock<HashMap<String, u64>>,
    current_input: RwLock<u64>,
    current_output: RwLock<u64>,
    next_id: AtomicU64,
    stdin_id: u64,
    stdout_id: u64,
    stderr_id: u64,
}

impl StreamTable {
    pub fn new() -> StreamTable {
        let table = StreamTable {
            streams: RwLock::new(HashMap::new()),
            aliases: RwLock::new(HashMap::new()),
            current_input: RwLock::new(1),
            current_output: RwLock::new(2),
            next_id: AtomicU64::new(4),
            stdin_id: 1,
            stdout_id: 2,
            stderr_id: 3,
        };
        table.install(1, "user_input", StreamMode::Read, Backend::Stdin);
        table.install(2, "user_output", StreamMode::Write, Backend::Stdout);
        table.install(3, "user_error", StreamMode::Write, Backend::Stderr);
        table
    }

    fn install(&self, id: u64, alias: &str, mode: StreamMode, backend: Backend) {
        let stream = Stream {
            id,
            name: alias.to_string(),
            mode,
            options: StreamOptions {
                alias: Some(alias.to_string()),
                eof_action: if mode == StreamMode::Read {
                    EofAction::Reset
                } else {
                    EofAction::EofCode
                },
                ..StreamOptions::default()
            },
            backend,
            pushback: VecDeque::new(),
            position: 0,
            eof_seen: false,
        };
        self.streams
            .write()
            .expect("stream table poisoned")
            .insert(id, Arc::new(Mutex::new(stream)));
        self.aliases
            .write()
            .expect("alias table poisoned")
            .insert(alias.to_string(), id);
    }

    pub fn term_for(&self, id: u64) -> Term {
        Term::Opaque(OpaqueRef::new(Arc::new(StreamHandle { id })))
    }

    fn register(&self, mut stream: Stream) -> Result<u64, Ball> {
        let id = self.next_id.fetch_add(1, AtomicOrdering::Relaxed);
        stream.id = id;
        if let Some(alias) = stream.options.alias.clone() {
            let mut aliases = self.aliases.write().expect("alias table poisoned");
            if aliases.contains_key(&alias) {
                return Err(permission_error(
                    "open",
                    "source_sink",
                    Term::compound("alias", vec![Term::atom(&alias)]),
                ));
            }
            aliases.insert(alias, id);
        }
        self.streams
            .write()
            .expect("stream table poisoned")
            .insert(id, Arc::new(Mutex::new(stream)));
        Ok(id)
    }

    pub fn open_file(
        &self,
        path: &str,
        mode: StreamMode,
        options: StreamOptions,
    ) -> Result<u64, Ball> {
        let backend = match mode {
            StreamMode::Read => File::open(path).map(|f| Backend::FileIn(BufReader::new(f))),
            StreamMode::Write => File::create(path).map(|f| Backend::FileOut(BufWriter::new(f))),
            StreamMode::Append => OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map(|f| Backend::FileOut(BufWriter::new(f))),
        };
        let backend = backend.map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => existence_error("source_sink", Term::atom(path)),
            _ => permission_error("open", "source_sink", Term::atom(path)),
        })?;
        self.register(Stream {
            id: 0,
            name: path.to_string(),
            mode,
            options,
            backend,
            pushback: VecDeque::new(),
            position: 0,
            eof_seen: false,
        })
    }

    /// In-memory input stream over `text` (used for `read_term` from
    /// strings and by tests).
    pub fn open_string(&self, text: &str) -> u64 {
        self.register(Stream {
            id: 0,
            name: "<string>".to_string(),
            mode: StreamMode::Read,
            options: StreamOptions {
                reposition: true,
                ..StreamOptions::default()
            },
            backend: Backend::MemIn(Cursor::new(text.as_bytes().to_vec())),
            pushback: VecDeque::new(),
            position: 0,
            eof_seen: false,
        })
        .expect("anonymous stream cannot clash")
    }

    /// In-memory output sink; collect with [`StreamTable::take_output`].
    pub fn open_sink(&self) -> u64 {
        self.register(Stream {
            id: 0,
            name: "<sink>".to_string(),
            mode: StreamMode::Write,
            options: StreamOptions::default(),
            backend: Backend::MemOut(Vec::new()),
            pushback: VecDeque::new(),
            position: 0,
            eof_seen: false,
        })
        .expect("anonymous stream cannot clash")
    }

    pub fn take_output(&self, id: u64) -> Option<String> {
        let streams = self.streams.read().expect("stream table poisoned");
        let stream = streams.get(&id)?;
        let mut stream = stream.lock().expect("stream poisoned");
        match &mut stream.backend {
            Backend::MemOut(buf) => Some(String::from_utf8_lossy(&std::mem::take(buf)).into_owned()),
            _ => None,
        }
    }

    pub fn get(&self, id: u64) -> Option<Arc<Mutex<Stream>>> {
        self.streams
            .read()
            .expect("stream table poisoned")
            .get(&id)
            .cloned()
    }

    /// Resolve a stream-or-alias term.
    pub fn resolve(&self, term: &Term) -> Result<Arc<Mutex<Stream>>, Ball> {
        let t = term.deref();
        let id = match &t {
            Term::Var(_) => return Err(instantiation_error()),
            Term::Opaque(o) if o.tag() == "stream" => {
                o.downcast::<StreamHandle>().map(|h| h.id).ok_or_else(|| {
                    domain_error("stream_or_alias", &t)
                })?
            }
            Term::Atom(a) => *self
                .aliases
                .read()
                .expect("alias table poisoned")
                .get(a.name())
                .ok_or_else(|| existence_error("stream", t.clone()))?,
            other => return Err(domain_error("stream_or_alias", other)),
        };
        self.get(id)
            .ok_or_else(|| existence_error("stream", t.clone()))
    }

    pub fn current_input(&self) -> u64 {
        *self.current_input.read().expect("stream table poisoned")
    }

    pub fn current_output(&self) -> u64 {
        *self.current_output.read().expect("stream table poisoned")
    }

    pub fn set_current_input(&self, id: u64) {
        *self.current_input.write().expect("stream table poisoned") = id;
    }

    pub fn set_current_output(&self, id: u64) {
        *self.current_output.write().expect("stream table poisoned") = id;
    }

    pub fn is_standard(&self, id: u64) -> bool {
        id == self.stdin_id || id == self.stdout_id || id == self.stderr_id
    }

    pub fn close(&self, id: u64, force: bool) -> Result<(), Ball> {
        if self.is_standard(id) {
            // Closing a standard stream is a no-op.
            return Ok(());
        }
        let stream = match self.get(id) {
            Some(s) => s,
            None => return Ok(()),
        };
        {
            let mut stream = stream.lock().expect("stream poisoned");
            if let Err(e) = stream.close_backend() {
                if force {
                    log::warn!("forced close of stream {} ({}): {}", id, stream.name, e);
                } else {
                    return Err(crate::error::system_error(&e.to_string()));
                }
            }
            if let Some(alias) = &stream.options.alias {
                self.aliases
                    .write()
                    .expect("alias table poisoned")
                    .remove(alias);
            }
        }
        self.streams
            .write()
            .expect("stream table poisoned")
            .remove(&id);
        if self.current_input() == id {
            self.set_current_input(self.stdin_id);
        }
        if self.current_output() == id {
            self.set_current_output(self.stdout_id);
        }
        Ok(())
    }

    /// Force-close every non-standard stream; errors logged, never thrown.
    pub fn shutdown(&self) {
        let ids: Vec<u64> = self
            .streams
            .read()
            .expect("stream table poisoned")
            .keys()
            .copied()
            .filter(|id| !self.is_standard(*id))
            .collect();
        for id in ids {
            if let Err(e) = self.close(id, true) {
                log::warn!("error closing stream {} at shutdown: {}", id, e.term());
            }
        }
    }
}

impl Default for StreamTable {
    fn default() -> Self {
        StreamTable::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_stream_round_trip() {
        let table = StreamTable::new();
        let id = table.open_string("ab");
        let stream = table.get(id).unwrap();
        let mut s = stream.lock().unwrap();
        assert_eq!(s.get_char().unwrap(), Some('a'));
        assert_eq!(s.peek_char().unwrap(), Some('b'));
        assert_eq!(s.get_char().unwrap(), Some('b'));
        assert_eq!(s.get_char().unwrap(), None);
    }

    #[test]
    fn utf8_decoding() {
        let table = StreamTable::new();
        let id = table.open_string("é←");
        let stream = table.get(id).unwrap();
        let mut s = stream.lock().unwrap();
        assert_eq!(s.get_char().unwrap(), Some('é'));
        assert_eq!(s.peek_char().unwrap(), Some('←'));
        assert_eq!(s.get_char().unwrap(), Some('←'));
    }

    #[test]
    fn sink_collects_output() {
        let table = StreamTable::new();
        let id = table.open_sink();
        {
            let stream = table.get(id).unwrap();
            let mut s = stream.lock().unwrap();
            s.write_str("hello ").unwrap();
            s.write_str("world").unwrap();
        }
        assert_eq!(table.take_output(id).unwrap(), "hello world");
    }

    #[test]
    fn alias_resolution_and_close() {
        let table = StreamTable::new();
        let resolved = table.resolve(&Term::atom("user_output")).unwrap();
        assert_eq!(resolved.lock().unwrap().id, 2);
        let missing = table.resolve(&Term::atom("nope")).unwrap_err();
        let args = missing.term().match_struct("error", 2).unwrap();
        assert!(args[0].match_struct("existence_error", 2).is_some());
    }

    #[test]
    fn standard_streams_survive_shutdown() {
        let table = StreamTable::new();
        let id = table.open_string("x");
        table.shutdown();
        assert!(table.get(id).is_none());
        assert!(table.get(2).is_some());
    }

    #[test]
    fn positions_advance_and_seek() {
        let table = StreamTable::new();
        let id = table.open_string("abcd");
        let stream = table.get(id).unwrap();
        let mut s = stream.lock().unwrap();
        s.get_char().unwrap();
        s.get_char().unwrap();
        assert_eq!(s.position(), 2);
        s.seek_to(0).unwrap();
        assert_eq!(s.get_char().unwrap(), Some('a'));
    }
}
