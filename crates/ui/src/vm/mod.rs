mod course_vm;
mod error_vm;
mod lesson_body_vm;
mod notice_vm;
mod question_vm;
mod time_fmt;

pub use course_vm::{
    CourseOutlineVm, EnrollmentCardVm, LessonRowVm, ModuleVm, SummaryVm, course_outline_vm,
    map_enrollments, progress_bar, summary_vm,
};
pub use error_vm::ViewError;
pub use lesson_body_vm::{
    LessonBodyVm, LessonVm, draft_to_html, html_to_markdown, lesson_vm, looks_like_html,
    markdown_to_html, normalize_markdown, sanitize_html,
};
pub use notice_vm::{NoticeTone, NoticeVm, rate_limit_banner};
pub use question_vm::{
    AnswerInputError, OptionVm, QuestionBodyVm, QuestionVm, current_question_vm, parse_answer,
};
pub use time_fmt::{format_cooldown, format_countdown, format_datetime};
