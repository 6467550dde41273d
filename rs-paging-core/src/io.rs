use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::{env, fs, io};

use crate::error::{ChainError, ChainResult};

/// Lazy reader of a transition log.
///
/// A log is whitespace-separated integers, one page index per access, in
/// access order. Bytes are pulled from the reader's buffer and only the token
/// being read is kept, so a log written on a single line is never held in
/// memory. A token that is not an integer yields `MalformedToken` with its
/// 1-based position in the log; reading continues after it.
pub struct PageTokens<R> {
	reader: R,
	token: Vec<u8>,
	position: usize,
	finished: bool,
}

impl PageTokens<BufReader<File>> {
	/// Opens the log at `path`.
	pub fn open<P: AsRef<Path>>(path: P) -> ChainResult<Self> {
		Ok(Self::new(BufReader::new(File::open(path)?)))
	}
}

impl<R: BufRead> PageTokens<R> {
	pub fn new(reader: R) -> Self {
		Self { reader, token: Vec::new(), position: 0, finished: false }
	}

	fn take_token(&mut self) -> ChainResult<i64> {
		self.position += 1;
		let parsed = std::str::from_utf8(&self.token).ok().and_then(|token| token.parse::<i64>().ok());
		let result = parsed.ok_or_else(|| ChainError::MalformedToken {
			position: self.position,
			token: String::from_utf8_lossy(&self.token).into_owned(),
		});
		self.token.clear();
		result
	}
}

impl<R: BufRead> Iterator for PageTokens<R> {
	type Item = ChainResult<i64>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.finished {
			return None;
		}

		loop {
			let buf = match self.reader.fill_buf() {
				Ok(buf) => buf,
				Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
				Err(e) => {
					self.finished = true;
					return Some(Err(e.into()));
				}
			};
			if buf.is_empty() {
				self.finished = true;
				return (!self.token.is_empty()).then(|| self.take_token());
			}

			let mut used = 0;
			let mut complete = false;
			for &byte in buf {
				used += 1;
				if !byte.is_ascii_whitespace() {
					self.token.push(byte);
				} else if !self.token.is_empty() {
					complete = true;
					break;
				}
			}
			self.reader.consume(used);

			if complete {
				return Some(self.take_token());
			}
		}
	}
}

/// Builds an output path based on an input path and a new extension.
///
/// Example:
/// `data/trace.log` + `"bin"` → `data/trace.bin`
pub fn build_output_path<P: AsRef<Path>>(input_path: P, output_extension: &str) -> io::Result<PathBuf> {
	let input_path = input_path.as_ref();

	let parent = input_path.parent().unwrap_or_else(|| Path::new("."));
	let file_stem = input_path
		.file_stem()
		.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Input path has no filename"))?;

	let mut output = PathBuf::from(parent);
	output.push(file_stem);
	output.set_extension(output_extension);

	Ok(output)
}

/// Extracts the base filename without extension.
///
/// Examples:
/// - `"./data/trace.log"` → `"trace"`
/// - `"trace.log"` → `"trace"`
pub fn get_filename<P: AsRef<Path>>(input_path: P) -> io::Result<String> {
	let stem = input_path
		.as_ref()
		.file_stem()
		.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Path has no filename"))?;

	Ok(stem.to_string_lossy().to_string())
}

/// True when `derived` is missing, unreadable, or older than `source`.
pub fn is_stale<P: AsRef<Path>, Q: AsRef<Path>>(derived: P, source: Q) -> bool {
	let modified = |path: &Path| fs::metadata(path).and_then(|m| m.modified());
	match (modified(derived.as_ref()), modified(source.as_ref())) {
		(Ok(derived), Ok(source)) => derived < source,
		_ => true,
	}
}

/// Normalize a folder path.
///
/// - `"."` or `"./"` resolves to the current working directory
/// - Other paths are returned as-is (not canonicalized)
pub fn normalize_folder(input: &str) -> PathBuf {
	if input == "." || input == "./" {
		env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
	} else {
		PathBuf::from(input)
	}
}

/// Lists all files with a given extension in a directory.
///
/// Returns file names only (no paths), sorted.
pub fn list_files<P: AsRef<Path>>(dir: P, extension: &str) -> io::Result<Vec<String>> {
	let mut files = Vec::new();

	for entry in fs::read_dir(dir)? {
		let path = entry?.path();
		if path.is_file() && path.extension() == Some(std::ffi::OsStr::new(extension)) {
			if let Some(name) = path.file_name() {
				files.push(name.to_string_lossy().to_string());
			}
		}
	}

	files.sort();
	Ok(files)
}

#[cfg(test)]
mod tests {
	use std::io::Cursor;
	use std::time::{Duration, SystemTime};

	use super::*;

	fn tokens(text: &str) -> Vec<ChainResult<i64>> {
		PageTokens::new(Cursor::new(text.to_owned())).collect()
	}

	#[test]
	fn reads_tokens_across_lines_and_blanks() {
		let pages: Vec<i64> = tokens("0 1\n\n  2\t3\r\n4").into_iter().map(Result::unwrap).collect();
		assert_eq!(pages, vec![0, 1, 2, 3, 4]);
	}

	#[test]
	fn empty_input_has_no_tokens() {
		assert!(tokens("").is_empty());
		assert!(tokens(" \n\n ").is_empty());
	}

	#[test]
	fn negative_numbers_parse_for_range_checking() {
		let pages: Vec<i64> = tokens("-1 7").into_iter().map(Result::unwrap).collect();
		assert_eq!(pages, vec![-1, 7]);
	}

	#[test]
	fn malformed_token_reports_its_position() {
		let mut all = tokens("0 1\n2 x3 4").into_iter();
		assert_eq!(all.next().unwrap().unwrap(), 0);
		assert_eq!(all.next().unwrap().unwrap(), 1);
		assert_eq!(all.next().unwrap().unwrap(), 2);
		let err = all.next().unwrap().unwrap_err();
		assert!(matches!(err, ChainError::MalformedToken { position: 4, ref token } if token == "x3"));
	}

	#[test]
	fn tokens_split_across_buffer_refills_are_joined() {
		let reader = BufReader::with_capacity(4, Cursor::new("123 4567\t89 0".to_owned()));
		let pages: Vec<i64> = PageTokens::new(reader).map(Result::unwrap).collect();
		assert_eq!(pages, vec![123, 4567, 89, 0]);
	}

	#[test]
	fn non_utf8_token_is_malformed() {
		let reader = Cursor::new(vec![b'1', b' ', 0xff, b'2', b' ', b'3']);
		let all: Vec<ChainResult<i64>> = PageTokens::new(reader).collect();
		assert_eq!(all.len(), 3);
		assert!(matches!(all[1], Err(ChainError::MalformedToken { position: 2, .. })));
		assert_eq!(*all[2].as_ref().unwrap(), 3);
	}

	#[test]
	fn output_path_swaps_the_extension() {
		let path = build_output_path("data/trace.log", "bin").unwrap();
		assert_eq!(path, PathBuf::from("data/trace.bin"));
		assert_eq!(get_filename("./data/trace.log").unwrap(), "trace");
	}

	#[test]
	fn list_files_filters_by_extension() {
		let dir = tempfile::tempdir().unwrap();
		fs::write(dir.path().join("b.log"), "0").unwrap();
		fs::write(dir.path().join("a.log"), "0").unwrap();
		fs::write(dir.path().join("a.bin"), "").unwrap();
		fs::create_dir(dir.path().join("c.log")).unwrap();
		assert_eq!(list_files(dir.path(), "log").unwrap(), vec!["a.log", "b.log"]);
	}

	#[test]
	fn missing_files_are_stale() {
		let dir = tempfile::tempdir().unwrap();
		let source = dir.path().join("trace.log");
		fs::write(&source, "0 1").unwrap();
		assert!(is_stale(dir.path().join("trace.bin"), &source));
	}

	#[test]
	fn derived_file_older_than_its_source_is_stale() {
		let dir = tempfile::tempdir().unwrap();
		let source = dir.path().join("trace.log");
		let derived = dir.path().join("trace.bin");
		fs::write(&source, "0 1").unwrap();
		fs::write(&derived, "").unwrap();

		let now = SystemTime::now();
		File::options().write(true).open(&derived).unwrap().set_modified(now).unwrap();
		File::options().write(true).open(&source).unwrap().set_modified(now - Duration::from_secs(60)).unwrap();
		assert!(!is_stale(&derived, &source));

		File::options().write(true).open(&source).unwrap().set_modified(now + Duration::from_secs(60)).unwrap();
		assert!(is_stale(&derived, &source));
	}
}
