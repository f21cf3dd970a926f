#[test]
#[should_panic(expected = "no process-wide collector")]
fn attach_before_construct() {
    hazptr::attach_thread();
}
