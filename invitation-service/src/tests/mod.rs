mod invitation_handlers_test;
