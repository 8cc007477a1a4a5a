//! Radix-2 fast Fourier transform.

use std::f32::consts::PI;

use num_complex::Complex;

/// An in-place iterative Cooley-Tukey transform planned for one size.
///
/// Inputs shorter than the planned size are zero-padded. The size is always
/// rounded up to a power of two.
#[derive(Debug, Clone)]
pub struct Radix2 {
    size: usize,
    bit_reversed: Vec<usize>,
    twiddles: Vec<Complex<f32>>,
}

impl Radix2 {
    pub fn new(len: usize) -> Self {
        let size = len.max(1).next_power_of_two();
        let bits = size.trailing_zeros();

        let bit_reversed = (0..size).map(|i| reverse_bits(i, bits)).collect();

        // e^{-2πi·k/size}; a block of width `w` uses every (size/w)-th entry
        let twiddles = (0..size / 2)
            .map(|k| Complex::from_polar(1.0, -2.0 * PI * k as f32 / size as f32))
            .collect();

        Self {
            size,
            bit_reversed,
            twiddles,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Full complex spectrum of `input`.
    pub fn process(&self, input: &[f32]) -> Vec<Complex<f32>> {
        let mut buffer = vec![Complex::new(0.0, 0.0); self.size];
        for (i, &sample) in input.iter().take(self.size).enumerate() {
            buffer[self.bit_reversed[i]] = Complex::new(sample, 0.0);
        }

        let mut half = 1;
        while half < self.size {
            let width = half * 2;
            let stride = self.size / width;

            for block in buffer.chunks_exact_mut(width) {
                let (evens, odds) = block.split_at_mut(half);
                for (k, (even, odd)) in evens.iter_mut().zip(odds.iter_mut()).enumerate() {
                    let t = self.twiddles[k * stride] * *odd;
                    *odd = *even - t;
                    *even += t;
                }
            }

            half = width;
        }

        buffer
    }

    /// Magnitudes of the non-negative frequency bins, `size / 2` of them.
    pub fn magnitudes(&self, input: &[f32]) -> Vec<f32> {
        let spectrum = self.process(input);

        spectrum[..self.size / 2]
            .iter()
            .map(|c| (c.re * c.re + c.im * c.im).sqrt())
            .collect()
    }
}

fn reverse_bits(index: usize, bits: u32) -> usize {
    if bits == 0 {
        return 0;
    }
    index.reverse_bits() >> (usize::BITS - bits)
}
