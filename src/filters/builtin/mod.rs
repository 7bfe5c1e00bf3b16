//! Built-in operations.
//!
//! Kernels are plain functions over [`Plane`](crate::core::tensor::Plane)s,
//! grouped by family. This module registers their descriptors.

pub mod background;
pub mod blur;
pub mod histogram;
pub mod intensity;
pub mod morphology;
pub mod quantize;
pub mod resize;
pub mod threshold;

use crate::filters::operation::OperationKind;
use crate::filters::registry::{Category, OperationDescriptor, OperationRegistry};

/// Register all built-in operations.
pub fn register_all(registry: &mut OperationRegistry) {
    register_background(registry);
    register_histogram(registry);
    register_threshold(registry);
    register_filters(registry);
    register_intensity(registry);
    register_geometry(registry);
}

fn register_background(registry: &mut OperationRegistry) {
    registry.register(
        OperationDescriptor::builder(OperationKind::RollingBall, "Rolling Ball")
            .category(Category::Background)
            .description("Subtract the background traced by a ball rolled under the intensity surface")
            .parameter("rolling_ball_radius")
            .build(),
    );
    registry.register(
        OperationDescriptor::builder(OperationKind::Dilate, "Box Dilation")
            .category(Category::Background)
            .description(
                "Subtract a reconstruction by dilation seeded at the plane minimum inside a border",
            )
            .parameter("dilation_box_size")
            .build(),
    );
    registry.register(
        OperationDescriptor::builder(OperationKind::StaticDilate, "Static Seed Dilation")
            .category(Category::Background)
            .description(
                "Subtract a reconstruction by dilation seeded with the plane lowered by a fixed level or its median",
            )
            .parameter("static_dilation_h")
            .build(),
    );
}

fn register_histogram(registry: &mut OperationRegistry) {
    registry.register(
        OperationDescriptor::builder(OperationKind::EqualizeHist, "Histogram Equalization")
            .category(Category::Histogram)
            .description("Global histogram equalization onto [0, 1]")
            .parameter("histogram_bins")
            .build(),
    );
    registry.register(
        OperationDescriptor::builder(OperationKind::AdaptiveHist, "Adaptive Equalization")
            .category(Category::Histogram)
            .description("Contrast-limited adaptive histogram equalization (CLAHE) onto [0, 1]")
            .parameter("adaptive_hist_clip")
            .parameter("adaptive_hist_kernel_size")
            .parameter("histogram_bins")
            .alias("eq_ada_hist")
            .build(),
    );
    registry.register(
        OperationDescriptor::builder(OperationKind::LocalEqualize, "Local Equalization")
            .category(Category::Histogram)
            .description("Rank of each pixel within a disk neighbourhood, onto [0, 1]")
            .parameter("local_eq_radius")
            .build(),
    );
}

fn register_threshold(registry: &mut OperationRegistry) {
    registry.register(
        OperationDescriptor::builder(OperationKind::Otsu, "Otsu Threshold")
            .category(Category::Threshold)
            .description("Binary region map above the Otsu level of the 8-bit plane")
            .build(),
    );
}

fn register_filters(registry: &mut OperationRegistry) {
    registry.register(
        OperationDescriptor::builder(OperationKind::GaussianBlur, "Gaussian Blur")
            .category(Category::Filter)
            .description("Separable Gaussian blur with reflected borders")
            .parameter("gaussian_blur_sigma")
            .build(),
    );
}

fn register_intensity(registry: &mut OperationRegistry) {
    registry.register(
        OperationDescriptor::builder(OperationKind::Gamma, "Gamma Correction")
            .category(Category::Intensity)
            .description("Raise non-negative intensities to a power")
            .parameter("gamma_correction")
            .build(),
    );
    registry.register(
        OperationDescriptor::builder(OperationKind::LogCorrection, "Log Correction")
            .category(Category::Intensity)
            .description("Logarithmic contrast correction gain * log2(1 + I)")
            .parameter("log_correction_gain")
            .build(),
    );
    registry.register(
        OperationDescriptor::builder(OperationKind::Rescale, "Rescale Intensity")
            .category(Category::Intensity)
            .description("Linearly map the plane's intensity range onto a fixed range")
            .parameter("intensity_rescale_range")
            .build(),
    );
    registry.register(
        OperationDescriptor::builder(OperationKind::Stretch, "Contrast Stretch")
            .category(Category::Intensity)
            .description("Clip to percentiles and stretch the window onto [0, 1]")
            .parameter("stretch_percentiles")
            .build(),
    );
}

fn register_geometry(registry: &mut OperationRegistry) {
    registry.register(
        OperationDescriptor::builder(OperationKind::Resize, "Area Resize")
            .category(Category::Geometry)
            .description("Downscale by an integer factor using block means")
            .parameter("tile_resize_factor")
            .build(),
    );
}
