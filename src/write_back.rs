use itertools::Itertools;

use crate::error::WriteBackError;
use crate::session::RecordedAnswer;
use crate::topic_store::{TopicId, TopicStore};

/// Stores quiz answers and doubt marks into the topics the questions came from.
///
/// Each topic is read once and rewritten as a whole. A question whose origin no
/// longer holds the same text fails its whole topic, which is then left untouched;
/// other topics are still written. Returns the outcome per topic, in topic order.
pub fn apply_quiz_answers<S: TopicStore + ?Sized>(
    store: &S,
    answers: &[RecordedAnswer],
) -> Vec<(TopicId, Result<usize, WriteBackError>)> {
    answers
        .iter()
        .into_group_map_by(|a| a.origin.topic.clone())
        .into_iter()
        .sorted_by(|a, b| a.0.cmp(&b.0))
        .map(|(topic, group)| {
            let outcome = apply_to_topic(store, &topic, &group);
            if let Err(e) = &outcome {
                log::error!("quiz answers not saved to {topic}: {e}");
            }
            (topic, outcome)
        })
        .collect()
}

fn apply_to_topic<S: TopicStore + ?Sized>(
    store: &S,
    topic: &TopicId,
    answers: &[&RecordedAnswer],
) -> Result<usize, WriteBackError> {
    let mut questions = store.read_topic(topic)?;
    for answer in answers {
        let position = answer.origin.position;
        let question = questions
            .get_mut(position)
            .filter(|q| q.text == answer.text)
            .ok_or_else(|| WriteBackError::Unresolved {
                topic: topic.to_string(),
                position,
                text: answer.text.clone(),
            })?;
        question.quiz_answer = Some(answer.answers.clone());
        question.is_doubt_marked = answer.doubt_marked;
    }
    store.write_topic(topic, &questions)?;
    log::debug!("wrote {} quiz answers back to {topic}", answers.len());
    Ok(answers.len())
}
