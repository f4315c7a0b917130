mod test_answer_flow;
mod test_candidate_buffering;
mod test_failed_negotiation_closes_transport;
mod test_retry_exhaustion;
