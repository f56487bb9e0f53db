// src/engine/processor.rs
//
// Entry point for one request: validate the operation list against the
// source, pick a reduction factor, decode, run the pipeline, encode.

use super::common::run_with_panic_policy;
use super::config::ProcessorConfig;
use super::decoder::SourceDecoder;
use super::encoder::ImageEncoder;
use super::io::icc_color_space;
use super::pipeline::{apply, RenderContext};
use crate::error::{IiifError, Result};
use crate::geometry::{ReductionFactor, Size};
use crate::info::Orientation;
use crate::ops::{Encode, OperationList};
use image::DynamicImage;
use std::borrow::Cow;
use std::io::Write;
use std::sync::Arc;

/// Stateless apart from its configuration; one instance can serve any
/// number of requests, each on its own thread.
#[derive(Clone, Debug, Default)]
pub struct Processor {
    config: ProcessorConfig,
}

/// An operation list prepared against a concrete source.
struct Prepared {
    ops: OperationList,
    page: usize,
    full_size: Size,
    orientation: Orientation,
    reduction_factor: ReductionFactor,
}

impl Processor {
    pub fn new(config: ProcessorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Processes `ops` and writes the encoded result to `out`.
    pub fn process(
        &self,
        ops: &OperationList,
        decoder: &mut dyn SourceDecoder,
        encoder: &dyn ImageEncoder,
        out: &mut dyn Write,
    ) -> Result<()> {
        let encode = ops.encode().ok_or_else(|| {
            IiifError::invalid_argument("encode", "none", "operation list has no encode step")
        })?;
        if !encoder.supports(encode.format()) {
            return Err(IiifError::unsupported_format(encode.format().extension()));
        }

        let prepared = self.prepare(ops, decoder)?;
        let full_size = prepared.full_size;
        let unchanged = prepared.orientation == Orientation::Rotate0
            && !prepared
                .ops
                .has_effect(full_size, decoder.format().output_format());
        if unchanged {
            if let Some(bytes) = decoder.source_bytes()? {
                tracing::debug!(
                    target: "iiif_image::processor",
                    ops = %prepared.ops,
                    bytes = bytes.len(),
                    "operation list has no effect; copying source"
                );
                return out.write_all(&bytes).map_err(IiifError::output_write_failed);
            }
        }

        let icc = decoder
            .icc_profile()?
            .filter(|icc| icc_color_space(icc) == Some(*b"RGB "));
        let encode: Encode = encode.clone().with_icc_profile(icc.map(Arc::from));

        let decoded = decoder.decode(prepared.page, prepared.reduction_factor)?;
        let config = &self.config;
        let ctx = RenderContext {
            full_size,
            orientation: prepared.orientation,
            reduction_factor: decoded.reduction_factor,
            config,
        };
        let rendered = run_with_panic_policy("pipeline", || apply(&decoded.image, &prepared.ops, &ctx))?;
        encoder.encode(&rendered, &encode, out)
    }

    /// Processes `ops` and returns the raster instead of encoding it.
    pub fn render(
        &self,
        ops: &OperationList,
        decoder: &mut dyn SourceDecoder,
    ) -> Result<DynamicImage> {
        let prepared = self.prepare(ops, decoder)?;
        let decoded = decoder.decode(prepared.page, prepared.reduction_factor)?;
        let ctx = RenderContext {
            full_size: prepared.full_size,
            orientation: prepared.orientation,
            reduction_factor: decoded.reduction_factor,
            config: &self.config,
        };
        let rendered: Cow<'_, DynamicImage> =
            run_with_panic_policy("pipeline", || apply(&decoded.image, &prepared.ops, &ctx))?;
        Ok(rendered.into_owned())
    }

    /// Applies the per-source mutations to a copy of `ops`, validates it
    /// and chooses the reduction factor to decode at. A frozen list is
    /// used as is.
    fn prepare(&self, ops: &OperationList, decoder: &mut dyn SourceDecoder) -> Result<Prepared> {
        let page = ops.identifier().page_index();
        let count = decoder.page_count()?;
        if page >= count {
            return Err(IiifError::page_out_of_range(page, count));
        }
        let orientation = decoder.orientation()?;
        let full_size = orientation.adjusted_size(Size::from(decoder.size(page)?));

        let mut ops = ops.clone();
        if !ops.is_frozen() {
            ops.apply_non_endpoint_mutations(full_size)?;
        }
        ops.validate(full_size, &self.config.validation)?;

        let max_factor = decoder.num_resolutions()?.saturating_sub(1).min(u8::MAX as u32) as u8;
        let sc = ops.scale_constraint();
        let region = ops.region(full_size).size();
        let reduction_factor = match ops.scale() {
            Some(scale) => {
                let (sx, sy) = scale.resulting_scales(region, sc);
                ReductionFactor::for_scale(sx.max(sy), max_factor)
            }
            None => ReductionFactor::for_scale(sc.to_f64(), max_factor),
        };
        tracing::debug!(
            target: "iiif_image::processor",
            ops = %ops,
            full = %full_size,
            rf = %reduction_factor,
            max_factor,
            "reduction factor chosen"
        );
        Ok(Prepared {
            ops,
            page,
            full_size,
            orientation,
            reduction_factor,
        })
    }
}
