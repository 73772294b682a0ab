//! Bulk import of workout templates from CSV.
//!
//! One row per exercise. Rows sharing `workout_id` form one template, in the
//! order the ids first appear; the template's name and rest come from its
//! first row. Any malformed row rejects the whole file.

use crate::builder::{FALLBACK_TARGET_REPS, FALLBACK_TARGET_SETS};
use crate::rest_timer::FALLBACK_REST_SECONDS;
use crate::types::{ExerciseDef, WorkoutTemplate};
use crate::ImportError;
use csv::StringRecord;
use std::str::FromStr;

const WORKOUT_ID: &str = "workout_id";
const WORKOUT_NAME: &str = "workout_name";
const DEFAULT_REST: &str = "default_rest_seconds";
const EXERCISE_ID: &str = "exercise_id";
const EXERCISE_NAME: &str = "exercise_name";
const TARGET_SETS: &str = "target_sets";
const TARGET_REPS: &str = "target_reps";
const DEFAULT_WEIGHT: &str = "default_weight";

/// Column positions resolved from the header row
struct Columns {
    workout_id: usize,
    workout_name: usize,
    exercise_id: usize,
    exercise_name: usize,
    default_rest: Option<usize>,
    target_sets: Option<usize>,
    target_reps: Option<usize>,
    default_weight: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Result<Self, ImportError> {
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);
        let require = |name: &'static str| find(name).ok_or(ImportError::MissingColumn(name));

        Ok(Self {
            workout_id: require(WORKOUT_ID)?,
            workout_name: require(WORKOUT_NAME)?,
            exercise_id: require(EXERCISE_ID)?,
            exercise_name: require(EXERCISE_NAME)?,
            default_rest: find(DEFAULT_REST),
            target_sets: find(TARGET_SETS),
            target_reps: find(TARGET_REPS),
            default_weight: find(DEFAULT_WEIGHT),
        })
    }
}

/// One parsed data row
struct Row<'r> {
    line: u64,
    record: &'r StringRecord,
}

impl<'r> Row<'r> {
    fn text(&self, column: Option<usize>) -> &'r str {
        column
            .and_then(|c| self.record.get(c))
            .map(str::trim)
            .unwrap_or("")
    }

    fn required(&self, column: usize, field: &'static str) -> Result<&'r str, ImportError> {
        match self.text(Some(column)) {
            "" => Err(ImportError::MissingField {
                line: self.line,
                field,
            }),
            value => Ok(value),
        }
    }

    /// Empty falls back to `default`; anything unparseable fails
    fn number<T: FromStr>(
        &self,
        column: Option<usize>,
        field: &'static str,
        default: T,
    ) -> Result<T, ImportError> {
        match self.text(column) {
            "" => Ok(default),
            raw => raw.parse().map_err(|_| ImportError::InvalidNumber {
                line: self.line,
                field,
                value: raw.to_string(),
            }),
        }
    }
}

/// Parse CSV text into templates
pub fn parse_workouts(text: &str) -> Result<Vec<WorkoutTemplate>, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let columns = Columns::from_headers(reader.headers()?)?;
    let mut workouts: Vec<WorkoutTemplate> = Vec::new();

    for record in reader.records() {
        let record = record?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        let row = Row {
            line: record.position().map(|p| p.line()).unwrap_or(0),
            record: &record,
        };

        let workout_id = row.required(columns.workout_id, WORKOUT_ID)?;
        let workout_name = row.required(columns.workout_name, WORKOUT_NAME)?;
        let default_rest_seconds =
            row.number(columns.default_rest, DEFAULT_REST, FALLBACK_REST_SECONDS)?;

        let default_weight: f64 = row.number(columns.default_weight, DEFAULT_WEIGHT, 0.0)?;
        if !default_weight.is_finite() || default_weight < 0.0 {
            return Err(ImportError::InvalidNumber {
                line: row.line,
                field: DEFAULT_WEIGHT,
                value: row.text(columns.default_weight).to_string(),
            });
        }

        let exercise = ExerciseDef {
            id: row.required(columns.exercise_id, EXERCISE_ID)?.to_string(),
            name: row.required(columns.exercise_name, EXERCISE_NAME)?.to_string(),
            target_sets: row
                .number(columns.target_sets, TARGET_SETS, FALLBACK_TARGET_SETS)?
                .max(1),
            target_reps: row
                .number(columns.target_reps, TARGET_REPS, FALLBACK_TARGET_REPS)?
                .max(1),
            default_weight,
            rest_seconds: None,
        };

        match workouts.iter_mut().find(|w| w.id == workout_id) {
            Some(workout) if workout.exercises.iter().any(|e| e.id == exercise.id) => {
                return Err(ImportError::DuplicateExercise {
                    line: row.line,
                    workout_id: workout_id.to_string(),
                    exercise_id: exercise.id,
                });
            }
            Some(workout) => workout.exercises.push(exercise),
            None => workouts.push(WorkoutTemplate {
                id: workout_id.to_string(),
                name: workout_name.to_string(),
                default_rest_seconds,
                exercises: vec![exercise],
            }),
        }
    }

    if workouts.is_empty() {
        return Err(ImportError::Empty);
    }

    tracing::info!("Parsed {} workouts from CSV", workouts.len());
    Ok(workouts)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "workout_id,workout_name,default_rest_seconds,exercise_id,exercise_name,target_sets,target_reps,default_weight\n";

    #[test]
    fn test_two_workouts_in_file_order() {
        let text = format!(
            "{}{}",
            HEADER,
            "push,Push Day,120,bench,Bench Press,4,6,60\n\
             pull,Pull Day,90,row,Barbell Row,3,8,50\n\
             push,Push Day,120,ohp,Overhead Press,3,8,35\n\
             pull,Pull Day,90,curl,Curl,3,12,12.5\n"
        );

        let workouts = parse_workouts(&text).unwrap();
        assert_eq!(workouts.len(), 2);

        assert_eq!(workouts[0].id, "push");
        assert_eq!(workouts[0].default_rest_seconds, 120);
        let push: Vec<_> = workouts[0].exercises.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(push, ["bench", "ohp"]);

        assert_eq!(workouts[1].id, "pull");
        assert_eq!(workouts[1].exercises.len(), 2);
        assert_eq!(workouts[1].exercises[1].default_weight, 12.5);
        assert_eq!(workouts[1].exercises[1].target_reps, 12);
    }

    #[test]
    fn test_missing_exercise_name_fails_whole_file() {
        let text = format!(
            "{}{}",
            HEADER,
            "push,Push Day,120,bench,Bench Press,4,6,60\n\
             push,Push Day,120,ohp,,3,8,35\n"
        );

        let err = parse_workouts(&text).unwrap_err();
        assert!(matches!(
            err,
            ImportError::MissingField {
                line: 3,
                field: "exercise_name"
            }
        ));
    }

    #[test]
    fn test_repeated_exercise_id_fails_whole_file() {
        let text = format!(
            "{}{}",
            HEADER,
            "push,Push Day,120,bench,Bench Press,4,6,60\n\
             pull,Pull Day,90,bench,Bench Pull,3,8,40\n\
             push,Push Day,120,bench,Incline Bench,3,8,50\n"
        );

        match parse_workouts(&text) {
            Err(ImportError::DuplicateExercise {
                line,
                workout_id,
                exercise_id,
            }) => {
                assert_eq!(line, 4);
                assert_eq!(workout_id, "push");
                assert_eq!(exercise_id, "bench");
            }
            other => panic!("expected duplicate exercise, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_numbers_take_defaults() {
        let text = format!("{}{}", HEADER, "legs,Legs,,squat,Squat,,,\n");
        let workouts = parse_workouts(&text).unwrap();
        let squat = &workouts[0].exercises[0];

        assert_eq!(workouts[0].default_rest_seconds, 90);
        assert_eq!(squat.target_sets, 3);
        assert_eq!(squat.target_reps, 8);
        assert_eq!(squat.default_weight, 0.0);
    }

    #[test]
    fn test_bad_number_is_rejected() {
        let text = format!("{}{}", HEADER, "legs,Legs,90,squat,Squat,three,5,100\n");
        match parse_workouts(&text) {
            Err(ImportError::InvalidNumber { field, value, .. }) => {
                assert_eq!(field, "target_sets");
                assert_eq!(value, "three");
            }
            other => panic!("expected invalid number, got {:?}", other),
        }

        let negative = format!("{}{}", HEADER, "legs,Legs,90,squat,Squat,3,5,-10\n");
        assert!(parse_workouts(&negative).is_err());
    }

    #[test]
    fn test_missing_column_and_empty_file() {
        let err = parse_workouts("workout_id,workout_name,exercise_id\nx,y,z\n").unwrap_err();
        assert!(matches!(err, ImportError::MissingColumn("exercise_name")));

        assert!(matches!(parse_workouts(HEADER), Err(ImportError::Empty)));
    }
}
