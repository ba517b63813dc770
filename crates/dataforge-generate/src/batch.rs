use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use dataforge_core::BatchDescriptor;

use crate::errors::SamplerError;
use crate::record::RecordGenerator;

/// Generate the records of one batch, in row index order.
///
/// The output depends only on the generator parameters and the descriptor's
/// seed and index range.
pub fn generate_batch<G: RecordGenerator + ?Sized>(
    generator: &G,
    batch: &BatchDescriptor,
) -> Result<Vec<G::Record>, SamplerError> {
    let mut rng = ChaCha8Rng::seed_from_u64(batch.seed);
    let mut records = Vec::with_capacity(batch.len() as usize);
    for row_index in batch.start_index..batch.end_index {
        records.push(generator.generate(row_index, &mut rng)?);
    }
    Ok(records)
}
