//! Editor controller
//!
//! Ties the document session, field store, armed kind, drag state and export
//! flag together. Front ends (browser, CLI) translate their events into calls
//! here and render whatever [`Editor::fields`] returns.

use crate::config::{ExportConfig, FieldmarkConfig};
use crate::drag::{DragController, DragState};
use crate::error::{FieldmarkError, Result};
use crate::export::{export_fields, ExportOutput};
use crate::field::{Field, FieldId, FieldKind};
use crate::persist::{load_fields, save_fields, KeyValueStore};
use crate::placement::{place, ContainerGeometry, Placement, ScreenPoint};
use crate::signature::SignatureCapture;
use crate::store::FieldStore;
use std::sync::Arc;

/// `true` for `application/pdf`, ignoring case and parameters
pub fn is_pdf_mime(mime: &str) -> bool {
    mime.split(';')
        .next()
        .map(|essence| essence.trim().eq_ignore_ascii_case(crate::PDF_MIME_TYPE))
        .unwrap_or(false)
}

/// The document currently being annotated
#[derive(Debug, Clone)]
pub struct DocumentSession {
    id: u64,
    file_name: String,
    source: Arc<[u8]>,
    total_pages: Option<u32>,
}

impl DocumentSession {
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// Known once the renderer has reported it
    pub fn total_pages(&self) -> Option<u32> {
        self.total_pages
    }
}

/// Snapshot of everything an export needs, detached from the editor so the
/// work can run while the editor keeps handling events.
#[derive(Debug, Clone)]
pub struct ExportJob {
    session_id: u64,
    source: Arc<[u8]>,
    fields: Vec<Field>,
    config: ExportConfig,
}

impl ExportJob {
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn run(&self, signature: &dyn SignatureCapture) -> Result<ExportOutput> {
        export_fields(&self.source, &self.fields, signature, &self.config)
    }
}

pub struct Editor {
    config: FieldmarkConfig,
    storage: Box<dyn KeyValueStore>,
    store: FieldStore,
    session: Option<DocumentSession>,
    next_session_id: u64,
    armed: Option<FieldKind>,
    drag: DragController,
    exporting: bool,
}

impl Editor {
    /// Create an editor, rehydrating any fields persisted under the configured
    /// key.
    pub fn new(config: FieldmarkConfig, storage: Box<dyn KeyValueStore>) -> Self {
        let persisted = load_fields(storage.as_ref(), &config.storage.key);
        if !persisted.is_empty() {
            tracing::info!(count = persisted.len(), "Rehydrated persisted fields");
        }
        Self {
            config,
            storage,
            store: FieldStore::from_fields(persisted),
            session: None,
            next_session_id: 1,
            armed: None,
            drag: DragController::new(),
            exporting: false,
        }
    }

    pub fn config(&self) -> &FieldmarkConfig {
        &self.config
    }

    pub fn session(&self) -> Option<&DocumentSession> {
        self.session.as_ref()
    }

    fn persist(&mut self) {
        save_fields(
            self.storage.as_mut(),
            &self.config.storage.key,
            self.store.list(),
        );
    }

    /// Start a new session for a selected file.
    ///
    /// Anything but a PDF is rejected and leaves the editor untouched.
    /// Otherwise the previous session and all its fields are discarded.
    pub fn open_document(
        &mut self,
        file_name: impl Into<String>,
        mime: &str,
        bytes: Vec<u8>,
    ) -> Result<()> {
        let file_name = file_name.into();
        if !is_pdf_mime(mime) {
            tracing::warn!(file_name = %file_name, mime, "Rejected non-PDF file");
            return Err(FieldmarkError::InvalidFileType(format!(
                "{} ({})",
                file_name, mime
            )));
        }

        tracing::info!(file_name = %file_name, bytes = bytes.len(), "Opened document");
        self.session = Some(DocumentSession {
            id: self.next_session_id,
            file_name,
            source: Arc::from(bytes),
            total_pages: None,
        });
        self.next_session_id += 1;
        self.store.clear();
        self.armed = None;
        self.drag.reset();
        self.persist();
        Ok(())
    }

    /// The renderer finished and knows the page count.
    pub fn document_rendered(&mut self, total_pages: u32) -> Result<()> {
        if self.session.is_none() {
            return Err(FieldmarkError::NoDocument);
        }
        if total_pages == 0 {
            return Err(self.render_failed("document has no pages"));
        }
        if let Some(session) = self.session.as_mut() {
            session.total_pages = Some(total_pages);
        }
        tracing::info!(total_pages, "Document rendered");
        Ok(())
    }

    /// The renderer could not display the document. The session is torn down
    /// and the error handed back for reporting.
    pub fn render_failed(&mut self, reason: impl Into<String>) -> FieldmarkError {
        let reason = reason.into();
        tracing::error!(%reason, "Render failed");
        self.session = None;
        self.armed = None;
        self.drag.reset();
        FieldmarkError::RenderFailed(reason)
    }

    pub fn arm(&mut self, kind: FieldKind) {
        self.armed = Some(kind);
    }

    pub fn disarm(&mut self) {
        self.armed = None;
    }

    pub fn armed_kind(&self) -> Option<FieldKind> {
        self.armed
    }

    /// Place the armed kind where the user clicked.
    ///
    /// Does nothing without an armed kind or a rendered document. The armed
    /// kind is consumed only when a field is actually added.
    pub fn click(&mut self, point: ScreenPoint, geometry: &ContainerGeometry) -> Option<Field> {
        let kind = self.armed?;
        let total_pages = self.session.as_ref()?.total_pages?;
        let Placement { page_number, x, y } = place(point, geometry)?;

        let field = self.store.add_field(kind, x, y, page_number, total_pages)?;
        tracing::debug!(
            field_id = field.id,
            kind = %kind,
            page = page_number,
            x,
            y,
            "Placed field"
        );
        self.armed = None;
        self.persist();
        Some(field)
    }

    pub fn update_value(&mut self, id: FieldId, value: impl Into<String>) -> bool {
        let updated = self.store.update_value(id, value);
        if updated {
            self.persist();
        }
        updated
    }

    pub fn remove_field(&mut self, id: FieldId) -> bool {
        let removed = self.store.remove(id);
        if removed {
            self.persist();
        }
        removed
    }

    pub fn fields(&self) -> &[Field] {
        self.store.list()
    }

    pub fn drag_state(&self) -> DragState {
        self.drag.state()
    }

    pub fn wants_pointer_moves(&self) -> bool {
        self.drag.wants_pointer_moves()
    }

    pub fn pointer_down(
        &mut self,
        field_id: FieldId,
        point: ScreenPoint,
        geometry: &ContainerGeometry,
    ) -> bool {
        self.drag.pointer_down(&self.store, field_id, point, geometry)
    }

    pub fn pointer_move(&mut self, point: ScreenPoint, geometry: &ContainerGeometry) -> bool {
        let moved = self.drag.pointer_move(&mut self.store, point, geometry);
        if moved {
            self.persist();
        }
        moved
    }

    pub fn pointer_up(
        &mut self,
        point: ScreenPoint,
        geometry: &ContainerGeometry,
    ) -> Option<Placement> {
        let placement = self.drag.pointer_up(&mut self.store, point, geometry);
        if placement.is_some() {
            self.persist();
        }
        placement
    }

    pub fn export_in_flight(&self) -> bool {
        self.exporting
    }

    /// Snapshot the session for export and mark an export as in flight.
    pub fn prepare_export(&mut self) -> Result<ExportJob> {
        if self.exporting {
            return Err(FieldmarkError::ExportInProgress);
        }
        let session = self.session.as_ref().ok_or(FieldmarkError::NoDocument)?;
        let job = ExportJob {
            session_id: session.id,
            source: Arc::clone(&session.source),
            fields: self.store.list().to_vec(),
            config: self.config.export.clone(),
        };
        self.exporting = true;
        Ok(job)
    }

    /// Record the outcome of a job from [`Editor::prepare_export`].
    ///
    /// On success the exported session is torn down and its fields cleared,
    /// unless another document was opened in the meantime.
    pub fn complete_export(
        &mut self,
        job: ExportJob,
        outcome: Result<ExportOutput>,
    ) -> Result<ExportOutput> {
        self.exporting = false;
        match &outcome {
            Ok(output) => {
                let current = self.session.as_ref().map(|s| s.id);
                if current == Some(job.session_id) {
                    self.session = None;
                    self.store.clear();
                    self.armed = None;
                    self.drag.reset();
                    self.persist();
                }
                tracing::info!(
                    bytes = output.bytes.len(),
                    skipped = output.warnings().len(),
                    "Export delivered"
                );
            }
            Err(e) => tracing::error!(error = %e, "Export failed"),
        }
        outcome
    }

    /// Prepare, run and complete an export in one step.
    pub fn export(&mut self, signature: &dyn SignatureCapture) -> Result<ExportOutput> {
        self.export_and_deliver(signature, |_| Ok(()))
    }

    /// Export, then hand the bytes to `deliver` before completing the job.
    ///
    /// The session and its fields are torn down only after delivery succeeds.
    /// A delivery error completes the job as failed and leaves them in place.
    pub fn export_and_deliver<F>(
        &mut self,
        signature: &dyn SignatureCapture,
        deliver: F,
    ) -> Result<ExportOutput>
    where
        F: FnOnce(&ExportOutput) -> Result<()>,
    {
        let job = self.prepare_export()?;
        let outcome = job.run(signature).and_then(|output| {
            deliver(&output)?;
            Ok(output)
        });
        self.complete_export(job, outcome)
    }

    pub fn output_file_name(&self) -> &str {
        &self.config.output.file_name
    }

    pub fn output_mime_type(&self) -> &str {
        &self.config.output.mime_type
    }
}
