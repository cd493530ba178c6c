/* 📖 # Why is the document built by an actor thread?

Scanner threads produce annotations concurrently, but merges must happen one at a time and in a
well-defined order. So scanners only send `BuildCommand`s over a channel, and a single builder
thread owns the write side of the document and applies the commands in the order received.

The first fatal error (an unknown section or an undecodable payload) stops the builder and
fails the ready gate with the error message. `Finish` opens the gate.
*/

use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread::JoinHandle;

use tracing::{debug, info, instrument, warn};

use swagdoc_base::{FilePath, PalHandle, ResultExt, SwagdocResult};

use crate::config::MountConfig;
use crate::handle::DocsHandle;
use crate::scanner::{AnnotationSink, FileAnnotations, scan_directory};
use crate::validator::{SchemaValidator, SwaggerSchemaValidator};

#[derive(Debug)]
pub enum BuildCommand {
    /// Merge all fragments of one file, in order.
    Apply(FileAnnotations),
    /// The scan is complete.
    Finish,
}

/// The single writer of a `DocsHandle`.
#[derive(Debug)]
pub struct DocumentBuilder {
    docs: DocsHandle,
    commands: Receiver<BuildCommand>,
}

impl DocumentBuilder {
    /// Start the builder thread. Commands sent on the returned channel are applied in order.
    pub fn spawn(docs: DocsHandle) -> SwagdocResult<(Sender<BuildCommand>, JoinHandle<()>)> {
        let (sender, commands) = channel();
        let builder = DocumentBuilder { docs, commands };
        let worker = std::thread::Builder::new()
            .name("document-builder".to_string())
            .spawn(move || builder.run())
            .map_err(|e| swagdoc_base::err!("Failed to spawn document builder: {}", e))?;
        Ok((sender, worker))
    }

    fn run(self) {
        let mut files = 0usize;
        while let Ok(command) = self.commands.recv() {
            match command {
                BuildCommand::Apply(file) => {
                    if let Err(error) = self.apply(&file) {
                        warn!(error = %error, "document build failed");
                        self.docs.ready_gate().fail(error.to_string());
                        return;
                    }
                    files += 1;
                }
                BuildCommand::Finish => {
                    info!(files, epoch = self.docs.epoch(), "API document ready");
                    self.docs.ready_gate().open();
                    return;
                }
            }
        }
        self.docs
            .ready_gate()
            .fail("document build ended before the scan finished");
    }

    fn apply(&self, file: &FileAnnotations) -> SwagdocResult<()> {
        let mut document = self.docs.write();
        for fragment in &file.fragments {
            document
                .apply_fragment(fragment)
                .with_context(|| format!("{}", file.path))?;
        }
        debug!(path = %file.path, fragments = file.fragments.len(), "applied annotations");
        Ok(())
    }
}

/// Forwards scanned files to the builder.
#[derive(Debug)]
struct BuilderSink(Sender<BuildCommand>);

impl AnnotationSink for BuilderSink {
    fn accept(&self, file: FileAnnotations) {
        // A closed channel means the builder already failed.
        let _ = self.0.send(BuildCommand::Apply(file));
    }
}

/// The documentation of one mount: its configuration and the document being built for it.
#[derive(Debug, Clone)]
pub struct ApiDocs {
    pal: PalHandle,
    mount: MountConfig,
    docs: DocsHandle,
}

impl ApiDocs {
    /// Start scanning and building in the background with the built-in Swagger 2.0 validator.
    ///
    /// Returns immediately; use `docs().wait_ready()` (or serve it through the middleware,
    /// which waits per request) to observe the outcome.
    pub fn spawn(pal: PalHandle, mount: MountConfig) -> SwagdocResult<ApiDocs> {
        Self::spawn_with_validator(pal, mount, Box::new(SwaggerSchemaValidator))
    }

    #[instrument(skip(pal, validator), fields(directory = %mount.directory))]
    pub fn spawn_with_validator(
        pal: PalHandle,
        mount: MountConfig,
        validator: Box<dyn SchemaValidator>,
    ) -> SwagdocResult<ApiDocs> {
        let docs = DocsHandle::new(validator);
        let (sender, _builder) = DocumentBuilder::spawn(docs.clone())?;

        let root = FilePath::from(mount.directory.as_str());
        let extension = mount.extension.clone();
        let scan_pal = pal.clone();
        let scan_docs = docs.clone();
        std::thread::Builder::new()
            .name("annotation-scanner".to_string())
            .spawn(move || {
                let sink = BuilderSink(sender);
                match scan_directory(&scan_pal, &root, &extension, &sink) {
                    Ok(result) => {
                        info!(
                            files = result.files_scanned,
                            skipped = result.errors.len(),
                            "annotation scan complete"
                        );
                        let _ = sink.0.send(BuildCommand::Finish);
                    }
                    Err(error) => {
                        warn!(error = %error, "annotation scan failed");
                        scan_docs.ready_gate().fail(error.to_string());
                    }
                }
            })
            .map_err(|e| swagdoc_base::err!("Failed to spawn annotation scanner: {}", e))?;

        Ok(ApiDocs { pal, mount, docs })
    }

    /// Scan and build, blocking until the document is ready.
    pub fn build(pal: PalHandle, mount: MountConfig) -> SwagdocResult<ApiDocs> {
        let api_docs = Self::spawn(pal, mount)?;
        api_docs.docs.wait_ready()?;
        Ok(api_docs)
    }

    pub fn pal(&self) -> &PalHandle {
        &self.pal
    }

    pub fn mount(&self) -> &MountConfig {
        &self.mount
    }

    pub fn docs(&self) -> &DocsHandle {
        &self.docs
    }
}
