//! RGBA surface bytes to the network's planar BGR input.
//!
//! Layout is `[1, 3, S, S]`, channel-major, planes ordered B, G, R. Each value
//! is `(byte - 127.5) / 128.0`. These constants and the channel order are what
//! the detection network was trained with; changing either changes its output.

use crate::error::{VisionError, VisionResult};

/// Pixel centre subtracted from each byte.
pub const INPUT_MEAN: f32 = 127.5;
/// Divisor applied after centring.
pub const INPUT_STD: f32 = 128.0;

/// Normalize one byte.
#[inline]
pub fn normalize(byte: u8) -> f32 {
    (byte as f32 - INPUT_MEAN) / INPUT_STD
}

/// Float32 input tensor of shape `[1, 3, size, size]`.
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    data: Vec<f32>,
    size: usize,
}

impl InputTensor {
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn shape(&self) -> [usize; 4] {
        [1, 3, self.size, self.size]
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// One channel plane; 0 = blue, 1 = green, 2 = red.
    pub fn plane(&self, channel: usize) -> &[f32] {
        let stride = self.size * self.size;
        &self.data[channel * stride..(channel + 1) * stride]
    }

    pub fn into_data(self) -> Vec<f32> {
        self.data
    }
}

/// Stateless encoder from RGBA bytes to [`InputTensor`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TensorEncoder;

impl TensorEncoder {
    /// Encode `pixels` (row-major RGBA, `size * size * 4` bytes).
    pub fn encode(pixels: &[u8], size: usize) -> VisionResult<InputTensor> {
        let stride = size * size;
        if pixels.len() != stride * 4 {
            return Err(VisionError::internal(format!(
                "pixel buffer holds {} bytes, expected {} for {}x{} RGBA",
                pixels.len(),
                stride * 4,
                size,
                size
            )));
        }

        let mut data = vec![0.0f32; stride * 3];
        {
            let (blue, rest) = data.split_at_mut(stride);
            let (green, red) = rest.split_at_mut(stride);

            for (i, px) in pixels.chunks_exact(4).enumerate() {
                red[i] = normalize(px[0]);
                green[i] = normalize(px[1]);
                blue[i] = normalize(px[2]);
            }
        }

        Ok(InputTensor { data, size })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_gray_maps_to_same_value_everywhere() {
        let size = 5;
        let pixels: Vec<u8> = [127, 127, 127, 255].repeat(size * size);
        let tensor = TensorEncoder::encode(&pixels, size).unwrap();

        assert_eq!(tensor.shape(), [1, 3, 5, 5]);
        assert_eq!(tensor.data().len(), 3 * 25);
        for v in tensor.data() {
            assert!((v - (-0.00390625)).abs() < 1e-7);
        }
    }

    #[test]
    fn test_channel_order_is_reversed() {
        let size = 2;
        let pixels: Vec<u8> = [255, 0, 0, 255].repeat(size * size);
        let tensor = TensorEncoder::encode(&pixels, size).unwrap();

        let low = (0.0 - 127.5) / 128.0;
        let high = (255.0 - 127.5) / 128.0;
        assert_eq!(tensor.plane(0)[0], low);
        assert_eq!(tensor.plane(1)[0], low);
        assert_eq!(tensor.plane(2)[0], high);
    }

    #[test]
    fn test_planes_keep_spatial_positions() {
        // 2x2 with a distinct blue value per pixel
        let pixels = [
            0, 0, 10, 255, //
            0, 0, 20, 255, //
            0, 0, 30, 255, //
            0, 0, 40, 255,
        ];
        let tensor = TensorEncoder::encode(&pixels, 2).unwrap();
        let blue: Vec<f32> = [10u8, 20, 30, 40].iter().map(|b| normalize(*b)).collect();
        assert_eq!(tensor.plane(0), blue.as_slice());
    }

    #[test]
    fn test_alpha_is_ignored() {
        let a = TensorEncoder::encode(&[1, 2, 3, 0], 1).unwrap();
        let b = TensorEncoder::encode(&[1, 2, 3, 255], 1).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rejects_wrong_buffer_length() {
        assert!(TensorEncoder::encode(&[0; 12], 2).is_err());
    }
}
