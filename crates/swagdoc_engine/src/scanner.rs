/* 📖 # Why is the scan fail-tolerant?

One unreadable controller should not hide the documentation of all the others. Only a failure to
list the root directory aborts the scan, since then there is nothing to document at all. Errors
reading nested directories or single files are collected in `ScanResult::errors`, logged, and the
scan carries on with the siblings.

Files of one directory are split into contiguous chunks, one per available core, and each chunk
is read on its own scoped thread. A chunk whose thread cannot be started is read inline. Each
file is handed to the sink as one `FileAnnotations` message with its fragments in source order;
the order between files is not fixed.
*/

use std::num::NonZeroUsize;

use tracing::{debug, instrument, warn};

use swagdoc_base::{FilePath, PalHandle, ResultExt, SwagdocError, SwagdocResult};

use crate::annotation::{AnnotationFragment, extract_fragments};

/// All section fragments found in one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAnnotations {
    pub path: FilePath,
    pub fragments: Vec<AnnotationFragment>,
}

/// Receives the annotations of each scanned file. Called from several threads at once.
pub trait AnnotationSink: Sync {
    fn accept(&self, file: FileAnnotations);
}

/// Outcome of a scan: how many files were read and what could not be read.
#[derive(Debug, Default)]
pub struct ScanResult {
    pub files_scanned: usize,
    /// Non-fatal errors, one per unreadable file or nested directory.
    pub errors: Vec<ScanError>,
}

#[derive(Debug)]
pub struct ScanError {
    pub path: FilePath,
    pub error: Box<SwagdocError>,
}

/// Recursively scan `root` for files ending in `.<extension>` and feed their annotations to `sink`.
///
/// Entries whose name contains no `.` are treated as directories and descended into; all other
/// entries are ignored.
///
/// ```no_run
/// use std::sync::Mutex;
/// use swagdoc_base::{FilePath, PalHandle, RealPal};
/// use swagdoc_engine::{AnnotationSink, FileAnnotations, scan_directory};
///
/// struct Collect(Mutex<Vec<FileAnnotations>>);
/// impl AnnotationSink for Collect {
///     fn accept(&self, file: FileAnnotations) {
///         self.0.lock().unwrap().push(file);
///     }
/// }
///
/// let pal = PalHandle::new(RealPal::new(".".into()));
/// let sink = Collect(Mutex::new(vec![]));
/// let result = scan_directory(&pal, &FilePath::from("controllers"), "js", &sink).unwrap();
/// for error in &result.errors {
///     eprintln!("skipped {}: {}", error.path, error.error);
/// }
/// ```
#[instrument(skip(pal, sink), fields(root = %root))]
pub fn scan_directory(
    pal: &PalHandle,
    root: &FilePath,
    extension: &str,
    sink: &dyn AnnotationSink,
) -> SwagdocResult<ScanResult> {
    let names = pal
        .read_directory(root)
        .with_context(|| format!("Failed to list source directory {}", root))?;

    let suffix = format!(".{}", extension);
    let mut result = ScanResult::default();
    scan_entries(pal, root, names, &suffix, sink, &mut result);

    debug!(
        files_scanned = result.files_scanned,
        errors_count = result.errors.len(),
        "directory scan complete"
    );
    Ok(result)
}

fn scan_entries(
    pal: &PalHandle,
    directory: &FilePath,
    names: Vec<String>,
    suffix: &str,
    sink: &dyn AnnotationSink,
    result: &mut ScanResult,
) {
    let (files, directories): (Vec<_>, Vec<_>) = names
        .into_iter()
        .filter(|name| name.ends_with(suffix) || !name.contains('.'))
        .map(|name| directory.join(&name))
        .partition(|path| path.file_name().is_some_and(|name| name.ends_with(suffix)));

    for (path, outcome) in read_files(pal, &files, sink) {
        match outcome {
            Ok(()) => result.files_scanned += 1,
            Err(error) => {
                warn!(path = %path, error = %error, "skipping unreadable file");
                result.errors.push(ScanError { path, error });
            }
        }
    }

    for path in directories {
        match pal.read_directory(&path) {
            Ok(names) => scan_entries(pal, &path, names, suffix, sink, result),
            Err(error) => {
                warn!(path = %path, error = %error, "skipping unreadable directory");
                result.errors.push(ScanError { path, error });
            }
        }
    }
}

type FileOutcome = (FilePath, SwagdocResult<()>);

/// Read `files` on at most one worker per available core, each worker taking a contiguous chunk.
fn read_files(pal: &PalHandle, files: &[FilePath], sink: &dyn AnnotationSink) -> Vec<FileOutcome> {
    let workers = std::thread::available_parallelism()
        .map_or(1, NonZeroUsize::get)
        .min(files.len());
    if workers <= 1 {
        return scan_chunk(pal, files, sink);
    }

    let chunk_size = files.len().div_ceil(workers);
    std::thread::scope(|scope| {
        let spawned: Vec<_> = files
            .chunks(chunk_size)
            .map(|chunk| {
                let worker = std::thread::Builder::new()
                    .name("annotation-reader".to_string())
                    .spawn_scoped(scope, move || scan_chunk(pal, chunk, sink));
                (chunk, worker)
            })
            .collect();
        spawned
            .into_iter()
            .flat_map(|(chunk, worker)| match worker {
                Ok(worker) => worker.join().unwrap_or_else(|_| {
                    chunk
                        .iter()
                        .map(|path| {
                            let error = swagdoc_base::err!("Scanning {} panicked", path);
                            (path.clone(), Err(error))
                        })
                        .collect()
                }),
                Err(error) => {
                    debug!(error = %error, "no reader thread available, reading inline");
                    scan_chunk(pal, chunk, sink)
                }
            })
            .collect()
    })
}

fn scan_chunk(pal: &PalHandle, chunk: &[FilePath], sink: &dyn AnnotationSink) -> Vec<FileOutcome> {
    chunk
        .iter()
        .map(|path| (path.clone(), scan_file(pal, path, sink)))
        .collect()
}

fn scan_file(pal: &PalHandle, path: &FilePath, sink: &dyn AnnotationSink) -> SwagdocResult<()> {
    let content = pal.read_file_to_string(path)?;
    let fragments = extract_fragments(&content);
    debug!(path = %path, fragments = fragments.len(), "extracted annotations");
    sink.accept(FileAnnotations {
        path: path.clone(),
        fragments,
    });
    Ok(())
}
