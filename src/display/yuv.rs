//! Packing of decoded YUV420p planes into one contiguous buffer.
//!
//! Chroma planes are half the luma size rounded up, so odd sized pictures
//! keep their last chroma column and row.

/// One plane as handed out by the decoder: `stride` bytes per row, of which
/// only the leading picture columns are meaningful.
#[derive(Clone, Copy)]
pub struct Plane<'a> {
    pub data: &'a [u8],
    pub stride: usize,
}

/// Chroma plane dimensions for a `width` x `height` picture.
pub fn chroma_dims(width: usize, height: usize) -> (usize, usize) {
    (width.div_ceil(2), height.div_ceil(2))
}

/// Total bytes of a packed YUV420p picture.
pub fn yuv420_size(width: usize, height: usize) -> usize {
    let (cw, ch) = chroma_dims(width, height);
    width * height + 2 * cw * ch
}

/// Write the Y, U and V planes of a `width` x `height` picture into `dst`
/// back to back, dropping row padding.
///
/// `dst` must hold [`yuv420_size`] bytes. Rows missing from a short plane
/// are left untouched.
pub fn pack_yuv420(dst: &mut [u8], width: usize, height: usize, planes: [Plane<'_>; 3]) {
    let (cw, ch) = chroma_dims(width, height);
    let (luma, chroma) = dst.split_at_mut((width * height).min(dst.len()));
    let (u_dst, v_dst) = chroma.split_at_mut((cw * ch).min(chroma.len()));

    let [y, u, v] = planes;
    copy_rows(luma, y, width);
    copy_rows(u_dst, u, cw);
    copy_rows(v_dst, v, cw);
}

fn copy_rows(dst: &mut [u8], plane: Plane<'_>, cols: usize) {
    if cols == 0 {
        return;
    }
    if plane.stride == cols {
        let n = dst.len().min(plane.data.len());
        dst[..n].copy_from_slice(&plane.data[..n]);
        return;
    }
    for (out, row) in dst
        .chunks_exact_mut(cols)
        .zip(plane.data.chunks(plane.stride.max(cols)))
    {
        let Some(row) = row.get(..cols) else {
            break;
        };
        out.copy_from_slice(row);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plane(data: &[u8], stride: usize) -> Plane<'_> {
        Plane { data, stride }
    }

    #[test]
    fn test_chroma_rounds_up() {
        assert_eq!(chroma_dims(4, 2), (2, 1));
        assert_eq!(chroma_dims(5, 3), (3, 2));
        assert_eq!(chroma_dims(1, 1), (1, 1));
        assert_eq!(yuv420_size(5, 3), 15 + 2 * 6);
        assert_eq!(yuv420_size(1920, 1080), 1920 * 1080 * 3 / 2);
    }

    #[test]
    fn test_pack_strips_stride_padding() {
        // 4x2 luma with stride 6, 2x1 chroma with stride 4
        let y = [1, 2, 3, 4, 0, 0, 5, 6, 7, 8, 0, 0];
        let u = [9, 10, 0, 0];
        let v = [11, 12, 0, 0];

        let mut dst = vec![0u8; yuv420_size(4, 2)];
        pack_yuv420(&mut dst, 4, 2, [plane(&y, 6), plane(&u, 4), plane(&v, 4)]);

        assert_eq!(dst, vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
    }

    #[test]
    fn test_pack_without_padding() {
        let y = [7u8; 16];
        let u = [8u8; 4];
        let v = [9u8; 4];
        let mut dst = vec![0u8; yuv420_size(4, 4)];
        pack_yuv420(&mut dst, 4, 4, [plane(&y, 4), plane(&u, 2), plane(&v, 2)]);

        assert_eq!(&dst[..16], &[7u8; 16]);
        assert_eq!(&dst[16..20], &[8u8; 4]);
        assert_eq!(&dst[20..], &[9u8; 4]);
    }

    #[test]
    fn test_pack_odd_size_keeps_last_chroma_column_and_row() {
        // 3x3 luma padded to 4, 2x2 chroma padded to 8
        let y = [1, 2, 3, 0, 4, 5, 6, 0, 7, 8, 9, 0];
        let u = [10, 11, 0, 0, 0, 0, 0, 0, 12, 13, 0, 0, 0, 0, 0, 0];
        let v = [14, 15, 0, 0, 0, 0, 0, 0, 16, 17];

        let mut dst = vec![0u8; yuv420_size(3, 3)];
        assert_eq!(dst.len(), 17);
        pack_yuv420(&mut dst, 3, 3, [plane(&y, 4), plane(&u, 8), plane(&v, 8)]);

        assert_eq!(
            dst,
            vec![1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17]
        );
    }
}
