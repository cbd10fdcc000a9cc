//! End-to-end region rendering tests against the synthetic codec.

use std::sync::Arc;

use jp2_render::{DispatchMode, ImageDescriptor, RegionCompositor, RegionError};

use super::test_utils::{
    expected_region, init_tracing, FailedHeaderCodec, SyntheticCodec,
};

type Setup = (Arc<SyntheticCodec>, RegionCompositor<SyntheticCodec>, ImageDescriptor);

async fn setup(codec: SyntheticCodec) -> Setup {
    let codec = Arc::new(codec);
    let compositor = RegionCompositor::with_shared_codec(Arc::clone(&codec));
    let image = ImageDescriptor::open(codec.as_ref(), "test.jp2").await.unwrap();
    assert!(image.header_loaded());
    (codec, compositor, image)
}

#[tokio::test]
async fn test_full_image_matches_explicit_region() {
    let (codec, compositor, image) = setup(SyntheticCodec::new()).await;

    // The descriptor is built from a single metadata fetch.
    assert_eq!(codec.header_fetches(), 1);

    let full = compositor.get_full_image(&image, 2).await.unwrap();
    let explicit = compositor
        .get_region(&image, 2, 0, 0, image.width(2), image.height(2))
        .await
        .unwrap();

    assert_eq!(full.buffer, explicit.buffer);
    assert_eq!((full.buffer.width(), full.buffer.height()), (250, 200));
    assert!(full.diagnostics.is_clean());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_output_identical_across_caps_and_modes() {
    init_tracing();
    let reference = expected_region(250, 135, 180, 265, 3);

    for mode in [DispatchMode::AdmissionOrdered, DispatchMode::CompletionOrdered] {
        for cap in [1usize, 2, 8] {
            let codec = Arc::new(SyntheticCodec::new());
            let compositor = RegionCompositor::with_shared_codec(Arc::clone(&codec))
                .with_max_in_flight(cap)
                .with_dispatch_mode(mode);
            let image = ImageDescriptor::open(codec.as_ref(), "test.jp2").await.unwrap();

            let response = compositor
                .get_region(&image, 1, 250, 135, 180, 400)
                .await
                .unwrap();

            assert!(response.diagnostics.is_clean());
            assert_eq!(
                response.buffer.pixels(),
                &reference[..],
                "mismatch with mode {:?} cap {}",
                mode,
                cap
            );
        }
    }
}

#[tokio::test]
async fn test_reference_region_clamps_and_composites() {
    // 1000x800 image, 256px tiles. At reduction 1: 500x400, 128px tiles.
    // (x=250, y=135, w=180, h=400): h clamps to 400 - 135 = 265 and the
    // request touches tile columns/rows 1..3 (9 tiles).
    let (codec, compositor, image) = setup(SyntheticCodec::new()).await;

    let response = compositor
        .get_region(&image, 1, 250, 135, 180, 400)
        .await
        .unwrap();

    assert_eq!(response.buffer.width(), 180);
    assert_eq!(response.buffer.height(), 265);
    assert_eq!(response.buffer.pixels(), &expected_region(250, 135, 180, 265, 3)[..]);
    assert!(response.diagnostics.is_clean());
    assert_eq!(codec.tile_fetches(), 9);
}

#[tokio::test]
async fn test_request_beyond_bounds_is_clamped() {
    let (_codec, compositor, image) = setup(SyntheticCodec::new()).await;

    // x = width - 10 with an oversized width: the buffer is 10 pixels wide
    // and never reads past the image extent.
    let response = compositor
        .get_region(&image, 0, 990, 100, 1000, 50)
        .await
        .unwrap();

    assert_eq!(response.buffer.width(), 10);
    assert_eq!(response.buffer.height(), 50);
    assert_eq!(response.buffer.pixels(), &expected_region(990, 100, 10, 50, 3)[..]);
    assert!(response.diagnostics.is_clean());
}

#[tokio::test]
async fn test_degenerate_region_returns_placeholder_without_decoding() {
    let (codec, compositor, image) = setup(SyntheticCodec::new()).await;

    // x lands on the image edge, so the clamped width is zero.
    let response = compositor
        .get_region(&image, 0, 1000, 0, 500, 500)
        .await
        .unwrap();
    assert_eq!((response.buffer.width(), response.buffer.height()), (1, 1));
    assert!(response.diagnostics.is_clean());

    // Zero-sized request straight away.
    let response = compositor.get_region(&image, 0, 10, 10, 0, 100).await.unwrap();
    assert_eq!((response.buffer.width(), response.buffer.height()), (1, 1));

    assert_eq!(codec.tile_fetches(), 0);
}

#[tokio::test]
async fn test_reduction_clamped_to_max() {
    let (_codec, compositor, image) = setup(SyntheticCodec::new()).await;

    let clamped = compositor.get_full_image(&image, 99).await.unwrap();
    let at_max = compositor
        .get_full_image(&image, image.max_reduction())
        .await
        .unwrap();

    assert_eq!(clamped.buffer, at_max.buffer);
    // 1000 halved five times with ceiling: 500, 250, 125, 63, 32.
    assert_eq!((clamped.buffer.width(), clamped.buffer.height()), (32, 25));
}

#[tokio::test]
async fn test_grayscale_tile_replicates_plane_zero() {
    let (_codec, compositor, image) = setup(SyntheticCodec::with_planes(1)).await;

    let response = compositor.get_region(&image, 1, 10, 20, 50, 40).await.unwrap();

    assert_eq!(response.buffer.pixels(), &expected_region(10, 20, 50, 40, 1)[..]);
    assert!(response.diagnostics.is_clean());
}

#[tokio::test]
async fn test_alpha_plane_is_ignored() {
    let (_codec, compositor, image) = setup(SyntheticCodec::with_planes(4)).await;

    let response = compositor.get_region(&image, 0, 100, 100, 300, 300).await.unwrap();

    // Four-plane tiles must produce the same RGB as three-plane tiles.
    assert_eq!(response.buffer.pixels(), &expected_region(100, 100, 300, 300, 3)[..]);
    assert!(response.diagnostics.is_clean());
}

#[tokio::test]
async fn test_boundary_coincidence_extra_tiles_contribute_nothing() {
    let (codec, compositor, image) = setup(SyntheticCodec::new()).await;

    // The request ends exactly on tile boundaries, so the inclusive
    // selection also fetches the neighboring column and row; their crops
    // are empty and the output is unaffected.
    let response = compositor.get_region(&image, 0, 0, 0, 256, 256).await.unwrap();

    assert_eq!(codec.tile_fetches(), 4);
    assert_eq!(response.buffer.pixels(), &expected_region(0, 0, 256, 256, 3)[..]);
    assert!(response.diagnostics.is_clean());
}

#[tokio::test]
async fn test_full_image_fetches_every_tile() {
    let (codec, compositor, image) = setup(SyntheticCodec::new()).await;

    let response = compositor.get_full_image(&image, 0).await.unwrap();

    assert_eq!(codec.tile_fetches(), 16);
    assert_eq!((response.buffer.width(), response.buffer.height()), (1000, 800));
    assert_eq!(response.buffer.pixels(), &expected_region(0, 0, 1000, 800, 3)[..]);
    assert!(response.diagnostics.is_clean());
}

#[tokio::test]
async fn test_failed_header_refuses_region_requests() {
    let codec = Arc::new(FailedHeaderCodec::new());
    let compositor = RegionCompositor::with_shared_codec(Arc::clone(&codec));
    let image = ImageDescriptor::open(codec.as_ref(), "broken.jp2").await.unwrap();

    assert!(!image.header_loaded());

    let result = compositor.get_region(&image, 0, 0, 0, 100, 100).await;
    match result {
        Err(RegionError::HeaderNotLoaded { image }) => assert_eq!(image, "broken.jp2"),
        other => panic!("expected HeaderNotLoaded, got {:?}", other.map(|r| r.diagnostics)),
    }

    // Refused before any decode work started.
    assert_eq!(codec.tile_fetches(), 0);
}

#[tokio::test]
async fn test_failing_tile_degrades_locally() {
    init_tracing();
    // Tile (1, 1) has row-major index 5; it covers destination pixels
    // x < 6, y < 121 of the (250, 135, 180, 400) region at reduction 1.
    let (_codec, compositor, image) = setup(SyntheticCodec::new().with_failing_tile(5)).await;

    let response = compositor
        .get_region(&image, 1, 250, 135, 180, 400)
        .await
        .unwrap();

    assert_eq!(response.diagnostics.failed_tiles, 1);
    assert_eq!(response.diagnostics.dropped_writes, 0);

    let oracle = expected_region(250, 135, 180, 265, 3);
    for row in 0..265u32 {
        for col in 0..180u32 {
            let got = response.buffer.get_rgb(col, row).unwrap();
            if col < 6 && row < 121 {
                assert_eq!(got, [0, 0, 0], "failed tile area not blank at ({col}, {row})");
            } else {
                let i = (row as usize * 180 + col as usize) * 3;
                assert_eq!(
                    got,
                    [oracle[i], oracle[i + 1], oracle[i + 2]],
                    "pixel corrupted at ({col}, {row})"
                );
            }
        }
    }
}
