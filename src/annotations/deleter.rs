//! Geometry-matched markup deletion

use tracing::{debug, info};

use super::matcher::geometry_matches;
use crate::document::Page;
use crate::engine::AnnotationEngine;
use crate::error::{AnnotationError, Result};
use crate::geometry::Rectangle;

/// Delete the first markup annotation whose geometry matches `targets`
///
/// Scans Highlight, Underline and StrikeOut annotations in native order and
/// deletes at most one. Returns [`AnnotationError::NotFound`] when nothing
/// matches.
#[tracing::instrument(skip(page, targets), fields(page = page.index(), rects = targets.len()))]
pub fn delete_matching<E: AnnotationEngine>(page: &Page<E>, targets: &[Rectangle]) -> Result<()> {
    if targets.is_empty() {
        return Err(AnnotationError::InvalidArgument(
            "no target rectangles given".to_string(),
        ));
    }
    if let Some(bad) = targets.iter().find(|r| !r.is_valid()) {
        return Err(AnnotationError::InvalidArgument(format!(
            "malformed rectangle {:?}",
            bad
        )));
    }

    let mut engine = page.acquire()?;
    let index = page.index();

    if !engine.has_annotation_layer(index)? {
        return Err(AnnotationError::NotPdf);
    }

    let tolerance = page.config().match_tolerance;
    let annots = engine.annotations(index)?;

    for (position, annot) in annots.iter().copied().enumerate() {
        if !engine.kind(index, annot)?.is_markup() {
            continue;
        }
        if geometry_matches(&*engine, index, annot, targets, page.height(), tolerance)? {
            engine.delete_annotation(index, annot)?;
            engine.finish()?;
            info!("Deleted annotation {} on page {}", position, index);
            return Ok(());
        }
    }

    debug!("No annotation on page {} matched {} rectangles", index, targets.len());
    Err(AnnotationError::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::test_support::{highlight_annot, native_quad, page_with};
    use crate::color::ColorSample;
    use crate::engine::{AnnotKind, FaultPoint, MemoryAnnotation};

    fn markup_count(page: &Page<crate::engine::MemoryEngine>) -> usize {
        page.document().with_engine(|e| {
            e.page_annotations(page.index())
                .iter()
                .filter(|a| a.kind.is_markup())
                .count()
        })
    }

    #[test]
    fn test_deletes_once_then_not_found() {
        let page = page_with(|engine, index| {
            engine
                .add_annotation(
                    index,
                    highlight_annot(100.0, 700.0, 300.0, 720.0, ColorSample::none()),
                )
                .unwrap();
            engine
                .add_annotation(
                    index,
                    highlight_annot(100.0, 600.0, 300.0, 620.0, ColorSample::none()),
                )
                .unwrap();
        });
        let target = [Rectangle::new(100.0, 72.0, 300.0, 92.0)];

        delete_matching(&page, &target).unwrap();
        assert_eq!(markup_count(&page), 1);
        assert!(matches!(delete_matching(&page, &target), Err(AnnotationError::NotFound)));
        assert_eq!(markup_count(&page), 1);
    }

    #[test]
    fn test_first_match_wins() {
        let page = page_with(|engine, index| {
            engine
                .add_annotation(
                    index,
                    highlight_annot(10.0, 10.0, 20.0, 20.0, ColorSample::rgb(1.0, 0.0, 0.0)),
                )
                .unwrap();
            engine
                .add_annotation(
                    index,
                    highlight_annot(10.0, 10.0, 20.0, 20.0, ColorSample::rgb(0.0, 1.0, 0.0)),
                )
                .unwrap();
        });

        delete_matching(&page, &[Rectangle::new(10.0, 772.0, 20.0, 782.0)]).unwrap();
        let remaining = page.document().with_engine(|e| e.page_annotations(0)[0].color);
        assert_eq!(remaining, ColorSample::rgb(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_ignores_non_markup() {
        let page = page_with(|engine, index| {
            engine
                .add_annotation(
                    index,
                    MemoryAnnotation::markup(
                        AnnotKind::Squiggly,
                        vec![native_quad(100.0, 700.0, 300.0, 720.0)],
                        ColorSample::none(),
                    ),
                )
                .unwrap();
        });

        let result = delete_matching(&page, &[Rectangle::new(100.0, 72.0, 300.0, 92.0)]);
        assert!(matches!(result, Err(AnnotationError::NotFound)));
        assert_eq!(page.document().with_engine(|e| e.page_annotations(0).len()), 1);
    }

    #[test]
    fn test_underline_and_strikeout_deletable() {
        let page = page_with(|engine, index| {
            for kind in [AnnotKind::Underline, AnnotKind::StrikeOut] {
                engine
                    .add_annotation(
                        index,
                        MemoryAnnotation::markup(
                            kind,
                            vec![native_quad(0.0, 0.0, 10.0, 10.0)],
                            ColorSample::none(),
                        ),
                    )
                    .unwrap();
            }
        });
        let target = [Rectangle::new(0.0, 782.0, 10.0, 792.0)];

        delete_matching(&page, &target).unwrap();
        delete_matching(&page, &target).unwrap();
        assert_eq!(markup_count(&page), 0);
    }

    #[test]
    fn test_rejects_bad_targets() {
        let page = page_with(|_, _| {});
        assert!(matches!(delete_matching(&page, &[]), Err(AnnotationError::InvalidArgument(_))));
        assert!(matches!(
            delete_matching(&page, &[Rectangle::new(10.0, 10.0, 5.0, 20.0)]),
            Err(AnnotationError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_fault_during_scan() {
        let page = page_with(|engine, index| {
            engine
                .add_annotation(
                    index,
                    highlight_annot(100.0, 700.0, 300.0, 720.0, ColorSample::none()),
                )
                .unwrap();
            engine.inject_fault(FaultPoint::DeleteAnnotation);
        });

        let result = delete_matching(&page, &[Rectangle::new(100.0, 72.0, 300.0, 92.0)]);
        assert!(matches!(result, Err(AnnotationError::EngineFault(_))));
        assert_eq!(markup_count(&page), 1);
    }

    #[test]
    fn test_non_pdf_page() {
        let mut engine = crate::engine::MemoryEngine::new();
        let index = engine.add_non_pdf_page(600.0, 800.0);
        let doc = std::sync::Arc::new(crate::document::Document::new("epub", engine));
        let page = doc.load_page(index).unwrap();
        let result = delete_matching(&page, &[Rectangle::new(0.0, 0.0, 1.0, 1.0)]);
        assert!(matches!(result, Err(AnnotationError::NotPdf)));
    }
}
