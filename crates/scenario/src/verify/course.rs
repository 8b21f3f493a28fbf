use std::sync::Arc;

use campus_client::{CourseResponse, RegisteredCourse, SearchCourseParams};
use campus_core::failure::Failure;
use campus_core::model::Course;

use super::{check_field, Sampler};

/// One search hit must satisfy every filter of the query.
pub fn verify_search_result(
    course: &CourseResponse,
    params: &SearchCourseParams,
) -> Result<(), Failure> {
    let violated = |filter: &str| -> Result<(), Failure> {
        Err(Failure::application(format!(
            "search result {} does not match the {filter} filter",
            course.code
        )))
    };

    if params.course_type.is_some_and(|t| t != course.course_type) {
        return violated("type");
    }
    if params.credit.is_some_and(|c| c != course.credit) {
        return violated("credit");
    }
    if params.teacher.as_ref().is_some_and(|t| *t != course.teacher) {
        return violated("teacher");
    }
    if params.period.is_some_and(|p| p != course.period) {
        return violated("period");
    }
    if params.day_of_week.is_some_and(|d| d != course.day_of_week) {
        return violated("day of week");
    }
    if params.status.is_some_and(|s| s != course.status) {
        return violated("status");
    }

    // A hit matches when all keywords occur in the name, or all occur in the keywords.
    let in_name = params.keywords.iter().all(|k| course.name.contains(k.as_str()));
    let in_keywords = params
        .keywords
        .iter()
        .all(|k| course.keywords.contains(k.as_str()));
    if !in_name && !in_keywords {
        return violated("keywords");
    }
    Ok(())
}

/// Sampled field checks plus the ordering check over the whole page.
///
/// Results must come in non-decreasing course code order.
pub fn verify_search_results(
    results: &[CourseResponse],
    params: &SearchCourseParams,
    sampler: Sampler,
) -> Vec<Failure> {
    let mut failures: Vec<Failure> = results
        .iter()
        .filter(|_| sampler.sample())
        .filter_map(|course| verify_search_result(course, params).err())
        .collect();

    if results.windows(2).any(|pair| pair[0].code > pair[1].code) {
        failures.push(Failure::application("course search results are out of order"));
    }
    failures
}

/// The syllabus must match what the course was created with.
pub fn verify_course_detail(response: &CourseResponse, course: &Course) -> Vec<Failure> {
    let spec = &course.spec;
    [
        check_field("course", "id", &course.id, &response.id),
        check_field("course", "code", &spec.code, &response.code),
        check_field("course", "type", &spec.course_type, &response.course_type),
        check_field("course", "name", &spec.name, &response.name),
        check_field("course", "description", &spec.description, &response.description),
        check_field("course", "credit", &spec.credit, &response.credit),
        check_field("course", "period", &spec.slot.period, &response.period),
        check_field("course", "day_of_week", &spec.slot.day, &response.day_of_week),
        check_field(
            "course",
            "teacher",
            &course.teacher.name().to_string(),
            &response.teacher,
        ),
        check_field("course", "keywords", &spec.keywords, &response.keywords),
    ]
    .into_iter()
    .filter_map(Result::err)
    .collect()
}

/// Every confirmed course that is not closing must be listed on its slot.
///
/// `expected` is snapshotted before the request. Listed courses the model
/// does not expect are skipped.
pub fn verify_registered_courses(
    response: &[RegisteredCourse],
    expected: &[Arc<Course>],
) -> Vec<Failure> {
    let mut failures = Vec::new();
    for course in expected.iter().filter(|c| !c.is_closing()) {
        let Some(listed) = response.iter().find(|r| r.id == course.id) else {
            failures.push(Failure::application(format!(
                "registered course {} is missing from the list",
                course.id
            )));
            continue;
        };
        let slot = course.slot();
        if listed.day_of_week != slot.day || listed.period != slot.period {
            failures.push(Failure::application(format!(
                "registered course {} is listed on {}#{} instead of {slot}",
                course.id, listed.day_of_week, listed.period
            )));
        }
        if let Err(f) = check_field("registered course", "name", &course.spec.name, &listed.name) {
            failures.push(f);
        }
    }
    failures
}
