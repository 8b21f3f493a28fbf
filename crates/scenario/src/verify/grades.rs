use campus_client::GradeResponse;
use campus_core::failure::Failure;
use campus_core::model::GradeSnapshot;

/// Every score the benchmark has posted must be reported back.
///
/// `expected` is snapshotted before the request. Courses and classes the
/// snapshot does not know are skipped, as are classes it knows but has not
/// graded yet.
pub fn verify_grades(response: &GradeResponse, expected: &GradeSnapshot) -> Vec<Failure> {
    let mut failures = Vec::new();
    for (course_id, classes) in &expected.courses {
        let graded: Vec<(&String, u32)> = classes
            .iter()
            .filter_map(|(class_id, score)| score.map(|s| (class_id, s)))
            .collect();
        if graded.is_empty() {
            continue;
        }

        let Some(course) = response.courses.iter().find(|c| &c.id == course_id) else {
            failures.push(Failure::application(format!(
                "grades of course {course_id} are missing"
            )));
            continue;
        };

        for (class_id, score) in graded {
            match course.class_scores.iter().find(|c| &c.class_id == class_id) {
                Some(reported) if reported.score == Some(score) => {}
                Some(reported) => failures.push(Failure::application(format!(
                    "score of class {class_id} is {:?}, expected {score}",
                    reported.score
                ))),
                None => failures.push(Failure::application(format!(
                    "class {class_id} is missing from the grades of course {course_id}"
                ))),
            }
        }
    }
    failures
}
