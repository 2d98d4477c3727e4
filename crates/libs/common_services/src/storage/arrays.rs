use crate::storage::StorageError;
use ndarray::{ArrayD, ArrayViewD};
use ndarray_npy::{ReadNpyError, ReadNpyExt, WriteNpyExt};

/// Serializes to the `.npy` format: header with dtype and shape, then row-major data.
pub fn encode_npy(array: ArrayViewD<'_, f64>) -> Result<Vec<u8>, StorageError> {
    let mut buffer = Vec::new();
    array.write_npy(&mut buffer)?;
    Ok(buffer)
}

/// Reads an `f64` or `f32` `.npy` payload. `f32` data is widened.
pub fn decode_npy(bytes: &[u8]) -> Result<ArrayD<f64>, StorageError> {
    match ArrayD::<f64>::read_npy(bytes) {
        Ok(array) => Ok(array),
        Err(ReadNpyError::WrongDescriptor(_)) => {
            let narrow = ArrayD::<f32>::read_npy(bytes)?;
            Ok(narrow.mapv(f64::from))
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array3, IxDyn};

    #[test]
    fn f64_arrays_survive_encoding() -> Result<(), StorageError> {
        let array = Array3::from_shape_fn((2, 4, 3), |(f, a, c)| {
            (f * 100 + a * 10 + c) as f64 + 0.123_456_789
        })
        .into_dyn();

        let decoded = decode_npy(&encode_npy(array.view())?)?;

        assert_eq!(decoded.shape(), &[2, 4, 3]);
        assert_eq!(decoded, array);
        Ok(())
    }

    #[test]
    fn f32_arrays_are_widened() -> Result<(), StorageError> {
        let narrow = ArrayD::<f32>::from_elem(IxDyn(&[1, 2, 3]), 0.5);
        let mut bytes = Vec::new();
        narrow.write_npy(&mut bytes)?;

        let decoded = decode_npy(&bytes)?;

        assert_eq!(decoded.shape(), &[1, 2, 3]);
        assert!(decoded.iter().all(|&v| (v - 0.5).abs() < f64::EPSILON));
        Ok(())
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            decode_npy(b"not an npy file"),
            Err(StorageError::Decode(_))
        ));
    }
}
