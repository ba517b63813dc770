use chrono::{NaiveDate, NaiveDateTime};
use rand::RngCore;

use dataforge_core::schema::LEADERBOARD_FIELDS;
use dataforge_core::{FieldDef, IdFormat, LeaderboardConfig};

use crate::errors::SamplerError;
use crate::record::{DatasetRecord, FieldValue, RecordGenerator};
use crate::samplers::{Sampler, UniformDate, UniformInt, UniformTimestamp, WeightedCategorical};

#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardRecord {
    pub row_index: u64,
    pub game_id: String,
    pub region: String,
    pub day: NaiveDate,
    pub player_id: String,
    pub score: i64,
    pub ts: NaiveDateTime,
}

impl DatasetRecord for LeaderboardRecord {
    fn fields() -> &'static [FieldDef] {
        LEADERBOARD_FIELDS
    }

    fn row_index(&self) -> u64 {
        self.row_index
    }

    fn value(&self, column: usize) -> FieldValue<'_> {
        match column {
            0 => FieldValue::UInt(self.row_index),
            1 => FieldValue::Text(&self.game_id),
            2 => FieldValue::Text(&self.region),
            3 => FieldValue::Date(self.day),
            4 => FieldValue::Text(&self.player_id),
            5 => FieldValue::Int(self.score),
            6 => FieldValue::Timestamp(self.ts),
            _ => FieldValue::Null,
        }
    }
}

/// Game scores. `day` and `ts` are drawn independently of each other.
#[derive(Debug, Clone)]
pub struct LeaderboardGenerator {
    game_id: WeightedCategorical,
    region: WeightedCategorical,
    day: UniformDate,
    player: UniformInt,
    player_format: IdFormat,
    score: UniformInt,
    ts: UniformTimestamp,
}

impl LeaderboardGenerator {
    pub fn new(config: &LeaderboardConfig) -> Result<Self, SamplerError> {
        Ok(Self {
            game_id: WeightedCategorical::new(&config.game_id)?,
            region: WeightedCategorical::new(&config.region)?,
            day: UniformDate::new(&config.day)?,
            player: UniformInt::new(&config.player_id)?,
            player_format: config.player_id_format.clone(),
            score: UniformInt::new(&config.score)?,
            ts: UniformTimestamp::new(&config.ts)?,
        })
    }
}

impl RecordGenerator for LeaderboardGenerator {
    type Record = LeaderboardRecord;

    fn generate(
        &self,
        row_index: u64,
        rng: &mut dyn RngCore,
    ) -> Result<LeaderboardRecord, SamplerError> {
        let game = self.game_id.sample(rng)?;
        let region = self.region.sample(rng)?;
        let day = self.day.sample(rng)?;
        let player = self.player.sample(rng)?;
        let player = u64::try_from(player).map_err(|_| SamplerError::OutOfRange {
            sampler: "player_id",
            message: format!("negative player number {player}"),
        })?;
        let score = self.score.sample(rng)?;
        let ts = self.ts.sample(rng)?;

        Ok(LeaderboardRecord {
            row_index,
            game_id: self.game_id.label(game).to_string(),
            region: self.region.label(region).to_string(),
            day,
            player_id: self.player_format.render(player),
            score,
            ts,
        })
    }
}
