//! Documents and page handles
//!
//! Engines are not thread-safe. A [`Document`] owns its engine behind a single
//! `parking_lot::Mutex`, and every annotation operation holds that lock for
//! its whole body through a scoped [`Operation`] guard, so a fault or early
//! return can never leave the document locked. Dropping the guard also ends
//! the engine operation, keeping mutations made before a fault.
//!
//! Two calls against the same document are fully serialized; calls against
//! different documents proceed independently.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use amnesia_annotations::document::Document;
//! use amnesia_annotations::engine::MemoryEngine;
//!
//! let mut engine = MemoryEngine::new();
//! engine.add_page(612.0, 792.0);
//!
//! let doc = Arc::new(Document::new("doc-123", engine));
//! let page = doc.load_page(0).unwrap();
//! assert_eq!(page.height(), 792.0);
//! ```

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::config::Config;
use crate::engine::AnnotationEngine;
use crate::error::{AnnotationError, Result};

/// A document whose engine context is guarded by one exclusive mutex
pub struct Document<E: AnnotationEngine> {
    /// Document identifier
    id: String,
    /// Matching tolerance and note sizing
    config: Config,
    /// Mutex serializing all engine access
    context: Mutex<E>,
}

impl<E: AnnotationEngine> Document<E> {
    /// Wrap an engine with the default configuration
    pub fn new(id: impl Into<String>, engine: E) -> Self {
        Self::with_config(id, engine, Config::default())
    }

    pub fn with_config(id: impl Into<String>, engine: E, config: Config) -> Self {
        Self {
            id: id.into(),
            config,
            context: Mutex::new(engine),
        }
    }

    /// Get the document ID
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn page_count(&self) -> u32 {
        self.context.lock().page_count()
    }

    /// Load a page and return a handle bound to it
    pub fn load_page(self: &Arc<Self>, index: u32) -> Result<Page<E>> {
        let mut engine = self.context.lock();

        if index >= engine.page_count() {
            return Err(AnnotationError::InvalidArgument(format!(
                "page {} out of range (document has {} pages)",
                index,
                engine.page_count()
            )));
        }

        let bounds = engine.load_page(index)?;
        tracing::debug!(
            document = %self.id,
            page = index,
            width = bounds.width(),
            height = bounds.height(),
            "Loaded page"
        );

        Ok(Page {
            document: Arc::clone(self),
            index,
            width: bounds.width(),
            height: bounds.height(),
        })
    }

    /// Execute a closure with shared access to the engine
    ///
    /// Access is serialized with every annotation operation.
    pub fn with_engine<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&E) -> R,
    {
        let engine = self.context.lock();
        f(&engine)
    }

    /// Execute a closure with mutable access to the engine
    pub fn with_engine_mut<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut E) -> R,
    {
        let mut engine = self.context.lock();
        f(&mut engine)
    }

    /// Take the engine back, e.g. to save the document
    pub fn into_engine(self) -> E {
        self.context.into_inner()
    }

    fn lock(&self) -> MutexGuard<'_, E> {
        self.context.lock()
    }
}

/// Handle to one loaded page of a document
pub struct Page<E: AnnotationEngine> {
    document: Arc<Document<E>>,
    index: u32,
    width: f64,
    height: f64,
}

impl<E: AnnotationEngine> Clone for Page<E> {
    fn clone(&self) -> Self {
        Self {
            document: Arc::clone(&self.document),
            index: self.index,
            width: self.width,
            height: self.height,
        }
    }
}

impl<E: AnnotationEngine> Page<E> {
    /// Zero-based page index
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    /// Page height, the flip axis for coordinate conversion
    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn document(&self) -> &Arc<Document<E>> {
        &self.document
    }

    pub fn config(&self) -> &Config {
        &self.document.config
    }

    /// Release the engine's page; later operations on this handle fail
    pub fn unload(&self) {
        self.document.lock().unload_page(self.index);
    }

    pub fn is_bound(&self) -> bool {
        self.document.lock().is_loaded(self.index)
    }

    /// Acquire the document lock and begin one engine operation
    ///
    /// The guard is the scope of the operation: it is released when dropped,
    /// whichever way the operation returns.
    pub(crate) fn acquire(&self) -> Result<Operation<'_, E>> {
        let mut engine = self.document.lock();
        if !engine.is_loaded(self.index) {
            return Err(AnnotationError::InvalidArgument(format!(
                "page {} is not bound to document {}",
                self.index, self.document.id
            )));
        }
        engine.begin_operation()?;
        Ok(Operation {
            engine,
            open: true,
        })
    }
}

/// Exclusive engine access for one annotation operation
pub(crate) struct Operation<'a, E: AnnotationEngine> {
    engine: MutexGuard<'a, E>,
    open: bool,
}

impl<E: AnnotationEngine> Operation<'_, E> {
    /// End the operation and report whether its mutations were committed
    pub(crate) fn finish(mut self) -> Result<()> {
        self.open = false;
        self.engine.end_operation()?;
        Ok(())
    }
}

impl<E: AnnotationEngine> Deref for Operation<'_, E> {
    type Target = E;

    fn deref(&self) -> &E {
        &self.engine
    }
}

impl<E: AnnotationEngine> DerefMut for Operation<'_, E> {
    fn deref_mut(&mut self) -> &mut E {
        &mut self.engine
    }
}

impl<E: AnnotationEngine> Drop for Operation<'_, E> {
    fn drop(&mut self) {
        if self.open {
            if let Err(e) = self.engine.end_operation() {
                tracing::warn!("Failed to end annotation operation: {}", e);
            }
        }
    }
}
