// src/iiif/v3/parameters.rs

use super::size::Size;
use crate::error::Result;
use crate::geometry::Size as Dimensions;
use crate::iiif::{self, SizeSyntax};
use crate::ops::Scale;

/// A parsed IIIF Image API 3.0 image request.
pub type Parameters = iiif::Parameters<Size>;

pub type ParametersBuilder = iiif::ParametersBuilder<Size>;

impl SizeSyntax for Size {
    const DEFAULT: &'static str = "max";

    fn parse_uri(value: &str) -> Result<Self> {
        Size::from_uri(value)
    }

    fn scale(&self) -> Result<Option<Scale>> {
        self.to_scale()
    }

    fn is_max_size(&self) -> bool {
        self.is_max()
    }

    fn max_upscaling(&self) -> bool {
        self.is_upscaling_allowed()
    }

    fn canonical_form(&self, region_size: Dimensions) -> Result<String> {
        self.to_canonical_string(region_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iiif::{OperationListContext, Quality, Region};
    use crate::ops::{Operation, OutputFormat, ScaleKind};

    #[test]
    fn test_from_uri() {
        let params = Parameters::from_uri("/iiif/cats.jpg/square/^max/0/color.webp").unwrap();
        assert_eq!(params.identifier(), "iiif/cats.jpg");
        assert_eq!(params.region(), &Region::Square);
        assert!(params.size().is_max());
        assert!(params.size().is_upscaling_allowed());
        assert_eq!(params.quality(), Quality::Color);
        assert_eq!(params.output_format(), OutputFormat::Webp);
    }

    #[test]
    fn test_full_size_rejected() {
        let err = Parameters::from_uri("id/full/full/0/default.jpg").unwrap_err();
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn test_canonical_link_example() {
        let params = Parameters::from_uri("id/pct:50,50,50,50/,50/15/gray.jpg").unwrap();
        assert_eq!(
            params
                .to_canonical_string(Dimensions::new(64.0, 56.0), ";")
                .unwrap(),
            "id/32,28,32,28/57,50/15/gray.jpg"
        );
    }

    #[test]
    fn test_canonical_full_max() {
        let params = Parameters::from_uri("id/0,0,64,56/pct:100/0.0/default.png").unwrap();
        assert_eq!(
            params
                .to_canonical_string(Dimensions::new(64.0, 56.0), ";")
                .unwrap(),
            "id/full/max/0/default.png"
        );
    }

    #[test]
    fn test_canonical_with_scale_constraint() {
        let params = Parameters::from_uri("id;1:2/full/max/0/default.jpg").unwrap();
        let list = params
            .to_operation_list(&OperationListContext::default())
            .unwrap();
        assert!(list.scale_constraint().has_effect());
        assert_eq!(
            params
                .to_canonical_string(Dimensions::new(64.0, 56.0), ";")
                .unwrap(),
            "id;1:2/full/max/0/default.jpg"
        );
    }

    #[test]
    fn test_caret_max_scales_up_to_policy() {
        let params = Parameters::from_uri("id/full/^max/0/default.jpg").unwrap();
        let ctx = OperationListContext::default().with_max_scale(2.0);
        let list = params.to_operation_list(&ctx).unwrap();
        let scale = list.scale().copied().unwrap();
        assert!(matches!(scale.kind(), ScaleKind::ToMax { .. }));
        assert!(scale.allows_upscaling());
        let out = list.resulting_size(Dimensions::new(64.0, 56.0));
        assert_eq!((out.int_width(), out.int_height()), (128, 112));
    }

    #[test]
    fn test_query_becomes_options() {
        let params = Parameters::from_uri("id/full/max/0/default.jpg?response-content-disposition=inline").unwrap();
        let list = params
            .to_operation_list(&OperationListContext::default())
            .unwrap();
        assert_eq!(
            list.options().get("response-content-disposition").map(String::as_str),
            Some("inline")
        );
        assert!(matches!(list.operations(), [Operation::Encode(_)]));
    }
}
