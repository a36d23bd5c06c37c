use super::*;

fn solid(w: u32, h: u32, px: [u8; 4]) -> Bitmap {
    let bytes = px.iter().copied().cycle().take((w * h * 4) as usize).collect();
    Bitmap::from_premul(w, h, bytes).unwrap()
}

#[test]
fn rotated_extent_handles_right_angles_exactly() {
    assert_eq!(rotated_extent(10, 20, 0.0), (10, 20));
    assert_eq!(rotated_extent(10, 20, 90.0), (20, 10));
    assert_eq!(rotated_extent(10, 20, 180.0), (10, 20));
    assert_eq!(rotated_extent(10, 20, -90.0), (20, 10));
}

#[test]
fn rotated_extent_grows_for_diagonals() {
    // 10 * sqrt(2) = 14.14...
    assert_eq!(rotated_extent(10, 10, 45.0), (15, 15));
}

#[test]
fn resize_hits_exact_target_size() {
    let src = solid(4, 2, [200, 100, 0, 255]);
    let out = resize_bicubic(&src, 9, 7).unwrap();
    assert_eq!((out.width, out.height), (9, 7));
    assert_eq!(out.rgba8_premul.len(), 9 * 7 * 4);
    let px = out.pixel(4, 3).unwrap();
    assert!(px[0].abs_diff(200) <= 1 && px[1].abs_diff(100) <= 1, "{px:?}");
    assert_eq!(px[3], 255);
}

#[test]
fn resize_to_same_size_is_identity() {
    let src = Bitmap::from_premul(2, 1, vec![1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
    assert_eq!(resize_bicubic(&src, 2, 1).unwrap(), src);
}

#[test]
fn resize_rejects_zero_target() {
    let src = solid(2, 2, [0, 0, 0, 255]);
    assert!(resize_bicubic(&src, 0, 2).is_err());
    assert!(resize_bicubic(&src, 2, 0).is_err());
}

#[test]
fn resized_color_never_exceeds_alpha() {
    let mut bytes = Vec::new();
    for i in 0..16u8 {
        if i % 2 == 0 {
            bytes.extend_from_slice(&[255, 255, 255, 255]);
        } else {
            bytes.extend_from_slice(&[0, 0, 0, 0]);
        }
    }
    let src = Bitmap::from_premul(4, 4, bytes).unwrap();
    let out = resize_bicubic(&src, 11, 11).unwrap();
    for px in out.rgba8_premul.chunks_exact(4) {
        assert!(px[0] <= px[3] && px[1] <= px[3] && px[2] <= px[3], "{px:?}");
    }
}

#[test]
fn quarter_turn_swaps_dimensions_and_reports_signed_delta() {
    let src = solid(8, 4, [255, 0, 0, 255]);
    let (out, growth) = rotate(&src, 90.0).unwrap();
    assert_eq!((out.width, out.height), (4, 8));
    assert_eq!(growth, (-4, 4));
    let center = out.pixel(2, 4).unwrap();
    assert!(center[0] > 200 && center[3] > 200, "{center:?}");
}

#[test]
fn diagonal_rotation_leaves_corners_transparent() {
    let src = solid(10, 10, [0, 0, 255, 255]);
    let (out, growth) = rotate(&src, 45.0).unwrap();
    assert_eq!((out.width, out.height), (15, 15));
    assert_eq!(growth, (5, 5));
    assert_eq!(out.pixel(0, 0), Some([0, 0, 0, 0]));
    assert!(out.pixel(7, 7).unwrap()[3] > 200);
}

#[test]
fn layers_beyond_rasterizer_limits_are_rejected() {
    assert!(rasterize(0, 10, |_| {}).is_err());
    assert!(rasterize(MAX_LAYER_DIM + 1, 1, |_| {}).is_err());
    let empty = rasterize(3, 2, |_| {}).unwrap();
    assert!(empty.rgba8_premul.iter().all(|&b| b == 0));
}
